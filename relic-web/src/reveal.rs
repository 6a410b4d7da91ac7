//! Scroll reveal glue: IntersectionObserver in, inline styles out
//!
//! The reveal decisions live in [`RevealTracker`]; this module only wires
//! DOM elements to section ids.

use crate::WebError;
use relic::{Intersection, RevealConfig, RevealTracker, SectionStyle, ViewerConfig};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlElement, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>;

/// Keeps the observer and its callback alive; `disconnect()` stops it.
#[wasm_bindgen]
pub struct RevealHandle {
    observer: IntersectionObserver,
    tracker: Rc<RefCell<RevealTracker>>,
    _callback: ObserverCallback,
}

#[wasm_bindgen]
impl RevealHandle {
    pub fn disconnect(&self) {
        self.observer.disconnect();
        log::info!("Scroll reveal disconnected");
    }

    /// Number of sections under observation.
    pub fn sections(&self) -> usize {
        self.tracker.borrow().len()
    }

    /// Number of sections revealed so far.
    pub fn revealed(&self) -> usize {
        self.tracker.borrow().revealed_count()
    }
}

/// Hide every scroll section and reveal each one as it scrolls into view.
///
/// `config` is optional JSON for [`RevealConfig`]. Without it the `reveal`
/// section of the viewer canvas `data-config` is used, falling back to
/// `.scroll-section` with a 0.2 threshold.
#[wasm_bindgen]
pub fn start_reveal(config: Option<String>) -> Result<RevealHandle, JsValue> {
    Ok(start(config)?)
}

fn start(config: Option<String>) -> Result<RevealHandle, WebError> {
    let window = web_sys::window().ok_or(WebError::MissingApi("window"))?;
    let document = window.document().ok_or(WebError::MissingApi("document"))?;
    let config = match config {
        Some(json) => RevealConfig::from_json(&json)?,
        None => page_config(&document)?,
    };
    let selector = config.selector.clone();
    let nodes = document.query_selector_all(&selector)?;

    let mut tracker = RevealTracker::new(config);
    let mut sections = Vec::with_capacity(nodes.length() as usize);
    for i in 0..nodes.length() {
        let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<HtmlElement>().ok()) else {
            continue;
        };
        let (id, style) = tracker.register();
        debug_assert_eq!(id, sections.len());
        apply_style(&element, &style);
        sections.push(element);
    }

    let thresholds: js_sys::Array = tracker
        .observer_thresholds()
        .into_iter()
        .map(JsValue::from_f64)
        .collect();
    let tracker = Rc::new(RefCell::new(tracker));
    let sections = Rc::new(sections);

    let callback: ObserverCallback = {
        let tracker = tracker.clone();
        let sections = sections.clone();
        Closure::new(move |entries: js_sys::Array, observer: IntersectionObserver| {
            for entry in entries.iter() {
                let entry: IntersectionObserverEntry = entry.unchecked_into();
                let target = entry.target();
                let Some(id) = sections.iter().position(|s| js_sys::Object::is(s.as_ref(), target.as_ref())) else {
                    continue;
                };
                if let Some(style) = tracker.borrow_mut().on_intersection(id, intersection(&entry)) {
                    apply_style(&sections[id], &style);
                    observer.unobserve(&target);
                }
            }
        })
    };

    let options = IntersectionObserverInit::new();
    options.set_threshold(&thresholds);
    let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options)?;
    for section in sections.iter() {
        observer.observe(section);
    }

    log::info!("Scroll reveal observing {} sections matching {}", sections.len(), selector);

    Ok(RevealHandle {
        observer,
        tracker,
        _callback: callback,
    })
}

/// The `reveal` section of the viewer canvas `data-config`, if any.
fn page_config(document: &web_sys::Document) -> Result<RevealConfig, WebError> {
    let json = document
        .query_selector(&ViewerConfig::default().canvas_selector)?
        .and_then(|canvas| canvas.dyn_into::<HtmlElement>().ok())
        .and_then(|canvas| canvas.dataset().get("config"));
    Ok(match json {
        Some(json) => ViewerConfig::from_json(&json)?.reveal,
        None => RevealConfig::default(),
    })
}

/// Non-intersecting entries report nothing visible.
fn intersection(entry: &IntersectionObserverEntry) -> Intersection {
    if !entry.is_intersecting() {
        return Intersection::default();
    }
    let viewport = entry
        .root_bounds()
        .map(|bounds| bounds.height())
        .filter(|height| *height > 0.0)
        .or_else(|| web_sys::window()?.inner_height().ok()?.as_f64());
    let visible = entry.intersection_rect().height();
    Intersection {
        ratio: entry.intersection_ratio(),
        viewport_coverage: match viewport {
            Some(height) if height > 0.0 => visible / height,
            _ => 0.0,
        },
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

fn apply_style(element: &HtmlElement, style: &SectionStyle) {
    let css = element.style();
    let mut result = css
        .set_property("opacity", &style.opacity_css())
        .and_then(|_| css.set_property("transform", &style.transform()));
    if let Some(transition) = &style.transition {
        result = result.and_then(|_| css.set_property("transition", transition));
    }
    if let Err(e) = result {
        log::warn!("Failed to style scroll section: {:?}", e);
    }
}
