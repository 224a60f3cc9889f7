pub mod driver;
pub mod hid_report;
#[cfg(test)]
pub mod hid_report_test;
