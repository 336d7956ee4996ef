pub mod color;
pub mod notice;
pub mod rating_bar;
pub mod status_bar;
pub mod task_list;
