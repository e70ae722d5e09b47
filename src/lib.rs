#![doc = include_str!("../README.md")]

pub use cw_event as event;
pub use cw_sched as sched;
pub use cw_task as task;
pub use cw_utils as utils;
