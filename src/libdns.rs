pub mod proto {
    pub use hickory_proto::*;
}
