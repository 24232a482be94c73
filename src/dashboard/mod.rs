mod controller;
mod fallback;
mod state;
mod store;
pub(crate) mod views;

pub(crate) use controller::{Dashboard, UploadSource};
pub(crate) use state::{DashboardState, Notice, NoticeKind};
