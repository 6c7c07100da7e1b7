//! Generated messages and client of the Dex gRPC API (`api.Dex`), built from
//! `proto/api.proto`.

#![allow(clippy::all)]

tonic::include_proto!("api");
