pub mod decode;
pub mod template;
