use crate::error::{DynFuture, DynResult};
use bytes::Bytes;
use hyper::header;
use hyper::http::StatusCode;
use hyper::service::{make_service_fn, service_fn};
use hyper::Method;
use hyper::{Body, Request, Response, Server};
#[allow(unused_imports)]
use log::{debug, error, info};
use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

/// Builds the response for a dynamic request. The returned future runs
/// outside the config lock, so handlers may await the controller freely.
pub type BuildPage =
    Box<dyn FnMut(Request<Body>) -> DynFuture<'static, DynResult<Response<Body>>> + Send>;

/// Takes a path and returns (mime_type, resource_data)
pub type GetResource = Box<dyn FnMut(&str) -> DynResult<(&str, Bytes)> + Send>;

pub struct ServerConfig {
    bind_addr: Option<IpAddr>,
    port: Option<u16>,
    build_page: Option<BuildPage>,
    web_resource: GetResource,
}

fn no_resource(_path: &str) -> DynResult<(&str, Bytes)> {
    Err("No resource".into())
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            bind_addr: None,
            port: None,
            build_page: None,
            web_resource: Box::new(no_resource),
        }
    }

    pub fn port(mut self, p: u16) -> Self {
        self.port = Some(p);
        self
    }

    pub fn bind_addr(mut self, a: IpAddr) -> Self {
        self.bind_addr = Some(a);
        self
    }

    pub fn build_page(mut self, f: BuildPage) -> Self {
        self.build_page = Some(f);
        self
    }

    pub fn web_resource(mut self, resource: GetResource) -> Self {
        self.web_resource = resource;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn text_response(status: StatusCode, text: String) -> DynResult<Response<Body>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(text))
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
}

async fn handle(conf: Arc<Mutex<ServerConfig>>, req: Request<Body>) -> DynResult<Response<Body>> {
    // Static resources answer plain GETs; everything else goes to the
    // dynamic page builder.
    if req.method() == Method::GET {
        let path = req.uri().path().to_owned();
        let resource = {
            let mut conf = conf.lock().unwrap();
            (conf.web_resource)(&path)
        };
        if let Ok((mime_type, data)) = resource {
            return Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime_type)
                .body(Body::from(data))
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        }
    }
    let page = {
        let mut conf = conf.lock().unwrap();
        conf.build_page.as_mut().map(|build_page| build_page(req))
    };
    match page {
        Some(page) => page.await,
        None => text_response(StatusCode::NOT_FOUND, "No dynamic content".to_string()),
    }
}

pub fn setup_server(
    conf: ServerConfig,
) -> (impl Future<Output = Result<(), hyper::Error>>, IpAddr, u16) {
    let port = conf.port.unwrap_or(0);
    let bind_addr = conf
        .bind_addr
        .unwrap_or_else(|| IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    let socket_addr = SocketAddr::new(bind_addr, port);
    let conf = Arc::new(Mutex::new(conf));
    let make_service = make_service_fn(move |_conn| {
        let conf = conf.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(conf.clone(), req))) }
    });
    let server = Server::bind(&socket_addr).serve(make_service);
    let port = server.local_addr().port();
    let addr = server.local_addr().ip();
    (server, addr, port)
}
