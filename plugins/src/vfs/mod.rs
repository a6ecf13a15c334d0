mod local;

pub use local::LocalVfs;
