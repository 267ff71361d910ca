pub mod layer_loader;
