pub(crate) mod attempts;
pub(crate) mod courses;
pub(crate) mod groups;
pub(crate) mod questions;
pub(crate) mod users;
