pub(crate) mod admission;
pub(crate) mod grading;
