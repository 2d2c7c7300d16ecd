pub mod upsf {
    pub mod v1 {
        tonic::include_proto!("upsf.v1");

        pub use upsf_client::UpsfClient;
        pub use upsf_server::{Upsf, UpsfServer};
    }
}
