// src/config.rs
//
// Static server configuration, read once from the command line and shared
// read-only by every worker.

use crate::engine::{Limits, MAX_PIXELS};
use crate::error::Result;
use crate::geometry::Dimensions;
use crate::resolver::HttpResolver;
use crate::server::ServerOptions;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "iiif-pipe")]
#[command(about = "IIIF-style image delivery endpoint")]
#[command(long_about = "\
IIIF-style image delivery endpoint

Images are addressed by URL:

  /api/iiif-pipe/v1/iiif/{identifier}/{region}/{size}/0/default.{jpg|png|gif}

The identifier is a percent-encoded http(s) URL. Optional query flags:
autoOrient=true, trimBorder=<0..1>, scale=down.")]
#[command(version)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Shared-cache lifetime in seconds (Cache-Control s-maxage)
    #[arg(long, default_value_t = 365 * 24 * 60 * 60)]
    pub max_age: u64,

    /// Upstream fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub fetch_timeout: u64,

    /// Whole-request deadline in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    /// Largest accepted upstream body, in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: u64,

    /// Maximum output width
    #[arg(long, default_value_t = 6000)]
    pub max_scale_width: u32,

    /// Maximum output height
    #[arg(long, default_value_t = 6000)]
    pub max_scale_height: u32,

    /// Maximum decoded source pixels
    #[arg(long, default_value_t = MAX_PIXELS)]
    pub max_source_pixels: u64,
}

impl ServerConfig {
    pub fn limits(&self) -> Limits {
        Limits::default()
            .with_max_scale_size(Dimensions::new(
                self.max_scale_width,
                self.max_scale_height,
            ))
            .with_max_source_pixels(self.max_source_pixels)
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_age: Duration::from_secs(self.max_age),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }

    pub fn build_resolver(&self) -> Result<HttpResolver> {
        HttpResolver::new(
            Duration::from_secs(self.fetch_timeout),
            self.max_body_bytes,
        )
    }
}
