//! Template engine adapters.

mod tera;

pub use self::tera::{TeraEngine, template_index};
