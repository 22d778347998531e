pub mod company;
pub mod project;
pub mod project_changes;
pub mod project_tag_relation;
pub mod tag;
pub mod user;
