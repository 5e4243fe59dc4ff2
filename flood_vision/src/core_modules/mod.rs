pub mod canned;
pub mod change_detector;
pub mod damage_mask;
pub mod estimator;
pub mod geo_raster;
pub mod grounding;
pub mod mask_renderer;
pub mod overlay_store;
pub mod raster_loader;
