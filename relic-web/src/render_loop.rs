//! Cancellable requestAnimationFrame loop

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

struct LoopInner {
    /// Id of the pending animation frame request
    pending: Cell<Option<i32>>,
    cancelled: Cell<bool>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl LoopInner {
    fn schedule(&self) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or("no window")?;
        if let Some(callback) = self.callback.borrow().as_ref() {
            let id = window.request_animation_frame(callback.as_ref().unchecked_ref())?;
            self.pending.set(Some(id));
        }
        Ok(())
    }
}

/// Calls `tick` once per display refresh until cancelled or dropped.
pub struct RenderLoop {
    inner: Rc<LoopInner>,
}

impl RenderLoop {
    pub fn start(mut tick: impl FnMut(f64) + 'static) -> Result<Self, JsValue> {
        let inner = Rc::new(LoopInner {
            pending: Cell::new(None),
            cancelled: Cell::new(false),
            callback: RefCell::new(None),
        });

        // Weak so the closure does not keep its own owner alive
        let weak = Rc::downgrade(&inner);
        let closure = Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
            let Some(inner) = weak.upgrade() else { return };
            inner.pending.set(None);
            if inner.cancelled.get() {
                return;
            }
            tick(timestamp);
            if !inner.cancelled.get() {
                if let Err(e) = inner.schedule() {
                    log::error!("Failed to schedule animation frame: {:?}", e);
                }
            }
        });
        *inner.callback.borrow_mut() = Some(closure);
        inner.schedule()?;

        Ok(Self { inner })
    }

    /// Stop the loop. The pending frame, if any, is cancelled so `tick` is
    /// never called again.
    pub fn cancel(&self) {
        self.inner.cancelled.set(true);
        if let Some(id) = self.inner.pending.take() {
            if let Some(window) = web_sys::window() {
                if let Err(e) = window.cancel_animation_frame(id) {
                    log::warn!("cancelAnimationFrame failed: {:?}", e);
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancelled.get()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}
