//! relic-web - browser entry points
//!
//! The hosting page calls these explicitly once the DOM is ready:
//!
//! ```js
//! import init, { start_reveal, start_viewer } from "./relic_web.js";
//! await init();
//! const reveal = start_reveal();
//! const viewer = await start_viewer();
//! // later: viewer.stop(); reveal.disconnect();
//! ```

mod error;
#[cfg(target_arch = "wasm32")]
mod render_loop;
#[cfg(target_arch = "wasm32")]
mod reveal;
#[cfg(target_arch = "wasm32")]
mod viewer;

pub use error::WebError;
#[cfg(target_arch = "wasm32")]
pub use reveal::{RevealHandle, start_reveal};
#[cfg(target_arch = "wasm32")]
pub use viewer::{ViewerHandle, start_viewer};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("logger already initialized: {}", e).into());
    }
    log::info!("relic-web loaded");
}
