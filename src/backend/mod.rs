pub mod boiler;
