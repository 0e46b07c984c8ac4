mod m79a;

pub use m79a::{MT29F, MT29F2G01ABAGD};
