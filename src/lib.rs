pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod notes;
pub mod service;
pub mod storage;
pub mod platform {
    pub mod capability;
}
pub mod render {
    pub mod compositor;
    pub mod presenter;
}
pub mod tasks {
    pub mod catalog;
    pub mod renderer;
    pub mod rotation;
    pub mod widget;
}
