pub mod dualsense;
pub mod xb360;
