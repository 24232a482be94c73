pub(crate) mod analysis;
pub(crate) mod class;
pub(crate) mod group;
pub(crate) mod lenient;
pub(crate) mod student;
