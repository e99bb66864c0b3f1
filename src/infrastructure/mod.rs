// Infrastructure layer - Wire codecs, network adapters and HTTP plumbing
pub mod chunked_json;
pub mod config;
pub mod http_response;
pub mod json_codec;
pub mod mjpeg;
pub mod proto_codec;
pub mod rpc_client;
pub mod udp_listener;
