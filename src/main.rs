mod config;
mod dispatch;
mod logger;
mod network;
mod proxy;
mod server;
mod shutdown;
mod static_files;

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use clap::{Arg, ArgAction, Command};
use futures_util::future::LocalBoxFuture;
use std::env;
use std::process::exit;
use std::time::Instant;

use config::{ConfigLoader, Overrides};
use server::{EdgeServer, SHUTDOWN_DEADLINE};
use shutdown::InterruptListener;

// Custom HTTP request logging middleware
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerMiddleware { service }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();

        let method = req.method().to_string();
        let path = req.path().to_string();
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let response_time = start_time.elapsed().as_millis();

            logger::get_logger().http(
                &client_ip,
                &method,
                &path,
                res.status().as_u16(),
                response_time,
            );

            Ok(res)
        })
    }
}

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const SERVER_SIGNATURE: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

fn cli() -> Command {
    Command::new("devgate")
        .version(PKG_VERSION)
        .about("Serve a static directory and proxy an API prefix to a backend, behind one address")
        .long_about("devgate serves the files of a directory and forwards GET and POST requests under a path prefix (default /api) to a single upstream backend, so a front-end and its API can be developed behind one listening address.\n\nCommand line options take precedence over a --config file, which takes precedence over the defaults.")
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Directory to serve static files from (defaults to the current directory)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("ADDR")
                .help("Address to listen on, ':port' or 'host:port' (default :9090)"),
        )
        .arg(
            Arg::new("proxy-addr")
                .long("proxy-addr")
                .alias("proxyAddr")
                .value_name("URL")
                .help("Upstream base URL for proxied requests (default http://api-dev:9500)"),
        )
        .arg(
            Arg::new("addr-prefix")
                .long("addr-prefix")
                .alias("addrPrefix")
                .value_name("PREFIX")
                .help("Path prefix whose GET and POST requests are proxied (default /api)"),
        )
        .arg(
            Arg::new("strip-prefix")
                .long("strip-prefix")
                .alias("stripPrefix")
                .value_name("BOOL")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
                .value_parser(clap::value_parser!(bool))
                .help("Remove the prefix from the path before forwarding upstream"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a JSON configuration file"),
        )
        .arg(
            Arg::new("symlinks")
                .short('S')
                .long("symlinks")
                .action(ArgAction::SetTrue)
                .help("Serve symbolic links that point outside the static directory"),
        )
        .arg(
            Arg::new("no-request-logging")
                .short('L')
                .long("no-request-logging")
                .action(ArgAction::SetTrue)
                .help("Disable HTTP request logging to keep console output clean"),
        )
        .arg(
            Arg::new("no-timestamps")
                .short('T')
                .long("no-timestamps")
                .action(ArgAction::SetTrue)
                .help("Disable timestamps in log messages"),
        )
}

fn overrides_from(matches: &clap::ArgMatches) -> Overrides {
    let value = |id: &str| matches.get_one::<String>(id).cloned();

    Overrides {
        config_file: value("config"),
        dir: value("dir"),
        port: value("port"),
        proxy_addr: value("proxy-addr"),
        addr_prefix: value("addr-prefix"),
        strip_prefix: matches.get_one::<bool>("strip-prefix").copied(),
        symlinks: matches.get_flag("symlinks"),
    }
}

#[actix_web::main]
async fn main() {
    let matches = cli().get_matches();

    logger::init_logger(
        !matches.get_flag("no-request-logging"),
        !matches.get_flag("no-timestamps"),
    );
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("devgate=info"));
    let app_logger = logger::get_logger();

    app_logger.startup_info(PKG_NAME, PKG_VERSION);

    let current_dir = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            app_logger.error(&format!("Cannot read the current directory: {}", e));
            exit(1);
        }
    };

    let configuration = match ConfigLoader::new(current_dir).load_configuration(&overrides_from(&matches)) {
        Ok(config) => config,
        Err(e) => {
            app_logger.error(&format!("Configuration error: {}", e));
            exit(1);
        }
    };

    app_logger.routing_info(
        &configuration.static_dir.display().to_string(),
        configuration.upstream.as_str(),
        &configuration.intercept_prefix,
        configuration.strip_prefix,
    );

    // Installed before binding so an early interrupt is not lost
    let mut interrupts = match InterruptListener::new() {
        Ok(listener) => listener,
        Err(e) => {
            app_logger.error(&format!("Failed to set up signal handling: {}", e));
            exit(1);
        }
    };

    let running = match EdgeServer::new(configuration).start() {
        Ok(running) => running,
        Err(e) => {
            app_logger.error(&format!("Failed to start server: {}", e));
            exit(1);
        }
    };

    if let Some(addr) = running.local_addrs().first() {
        let addresses = network::NetworkUtils::create_server_addresses(*addr);
        app_logger.server_info(
            SERVER_SIGNATURE,
            &addresses.local,
            addresses.network.as_deref(),
        );
    }

    interrupts.recv().await;
    app_logger.shutdown_message();
    shutdown::force_exit_on_repeat(interrupts);

    if let Err(e) = running.shutdown(SHUTDOWN_DEADLINE).await {
        app_logger.error(&format!("Server shutdown: {}", e));
        exit(1);
    }

    app_logger.info("Server exiting");
}
