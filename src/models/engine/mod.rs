pub mod hit_window;
pub mod playfield;
pub mod scroll;

pub use hit_window::HitWindow;
pub use playfield::{PlayfieldLayout, ScreenPoint, Viewport};
pub use scroll::ScrollResolver;
