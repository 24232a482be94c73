pub(crate) mod backend_client;
pub(crate) mod fragments;
pub(crate) mod normalize;
pub(crate) mod progress_chart;
pub(crate) mod report;
pub(crate) mod upload;
