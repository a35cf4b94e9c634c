//! Report rendering for skillscope.

pub mod html;

pub use html::{
    generate_class_html, generate_summary_html, write_class_html, write_summary_html,
};
