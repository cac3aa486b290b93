//! tether web server and UI.
//!
//! This crate provides the Leptos-based integration connect form and, when
//! built with the `ssr` feature, the `/integrations` backend service that
//! brokers provider OAuth and loads sample data.

#![allow(non_snake_case)]

pub mod app;
pub mod components;
pub mod state;
pub mod types;

#[cfg(feature = "hydrate")]
pub mod browser;

#[cfg(feature = "ssr")]
pub mod config;
#[cfg(feature = "ssr")]
pub mod error;
#[cfg(feature = "ssr")]
pub mod integrations;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::App;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}
