pub mod spotsync_core;
