use crate::{
    api::{attendance, export, member, tap},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

/// Replenish period in ms and burst size for a per-minute rate. Both stay non-zero.
fn limiter_quota(requests_per_min: u32) -> (u64, u32) {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    (per_ms.max(1), requests_per_min.max(1))
}

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let (per_ms, burst) = limiter_quota(requests_per_min);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("rate limiter period and burst are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let tap_limiter = Arc::new(build_limiter(config.rate_tap_per_min));
    let admin_limiter = Arc::new(build_limiter(config.rate_admin_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            // /tap, one per station scan
            .service(
                web::resource("/tap")
                    .wrap(tap_limiter)
                    .route(web::post().to(tap::tap)),
            )
            .service(
                web::scope("")
                    .wrap(admin_limiter)
                    .service(
                        web::scope("/attendance")
                            // /attendance
                            .service(web::resource("").route(web::get().to(attendance::dashboard)))
                            // /attendance/dates, registered before /{date}
                            .service(
                                web::resource("/dates")
                                    .route(web::get().to(attendance::attendance_dates)),
                            )
                            // /attendance/{date}
                            .service(
                                web::resource("/{date}")
                                    .route(web::get().to(attendance::attendance_by_date)),
                            ),
                    )
                    .service(
                        web::scope("/members")
                            // /members
                            .service(
                                web::resource("")
                                    .route(web::post().to(member::create_member))
                                    .route(web::get().to(member::list_members)),
                            )
                            // /members/{id}
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(member::get_member))
                                    .route(web::put().to(member::update_member))
                                    .route(web::delete().to(member::delete_member)),
                            ),
                    )
                    .service(web::resource("/export").route(web::get().to(export::export_csv))),
            ),
    );
}
