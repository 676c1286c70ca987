//! kirana - grocery listing scraper for Indian quick-commerce sites.
//!
//! Drives a real browser over the product feeds of BigBasket, Blinkit, Zepto
//! and Swiggy Instamart, collects rendered product cards with an incremental
//! scroll loop, and writes dated JSON snapshots or a local document store.

pub mod collector;
pub mod config;
pub mod driver;
pub mod extract;
pub mod runner;
pub mod sink;
pub mod targets;
