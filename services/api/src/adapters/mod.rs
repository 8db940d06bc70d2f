pub mod db;
pub mod mailer;
pub mod qr_reader;
pub mod qr_render;

pub use db::PgAdapter;
pub use mailer::LogMailer;
pub use qr_reader::{frame_from_image_bytes, RqrrDecoder};
pub use qr_render::QrRenderer;
