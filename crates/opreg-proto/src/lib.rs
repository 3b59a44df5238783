//! Generated wire types for `operatorcatalog.v1` (`spec.md` §6), compiled
//! from `proto/catalog.proto` by `tonic-build` at build time. The service
//! layer (`opreg-service`) is the only consumer; nothing here is
//! hand-written.

pub mod catalog {
    tonic::include_proto!("operatorcatalog.v1");
}
