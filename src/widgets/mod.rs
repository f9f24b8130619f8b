pub mod chrome;
pub mod form_view;
pub mod horizontal_menu;
pub mod listing;
pub mod status_bar;
