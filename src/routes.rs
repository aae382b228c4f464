use crate::{
    api::{attendance, leave, payroll, punches, regularization},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-scope limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let ingest_limiter = Arc::new(build_limiter(config.rate_ingest_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .service(
                // Device gateways post in bursts; they get their own limiter.
                web::scope("/punches")
                    .wrap(ingest_limiter)
                    .service(web::resource("").route(web::post().to(punches::ingest_punches)))
                    .service(
                        web::resource("/process").route(web::post().to(punches::process_punches)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .wrap(protected_limiter.clone())
                    .service(web::resource("").route(web::post().to(attendance::mark_attendance)))
                    .service(
                        web::resource("/lock").route(web::post().to(attendance::lock_attendance)),
                    )
                    .service(
                        web::resource("/summary")
                            .route(web::get().to(attendance::attendance_summary)),
                    )
                    .service(
                        web::resource("/{id}").route(web::put().to(attendance::update_attendance)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::create_leave)),
                    )
                    .service(
                        web::resource("/limits").route(web::put().to(leave::reconfigure_limit)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave::get_leave))
                            .route(web::put().to(leave::update_leave))
                            .route(web::delete().to(leave::delete_leave)),
                    )
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(leave::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(leave::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel").route(web::put().to(leave::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/regularization")
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::post().to(regularization::create_regularization)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(regularization::approve_regularization)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(regularization::reject_regularization)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .wrap(protected_limiter)
                    .service(web::resource("").route(web::post().to(payroll::create_payroll)))
                    .service(
                        web::resource("/preview").route(web::post().to(payroll::preview_payroll)),
                    )
                    .service(
                        web::resource("/slips/{id}").route(web::put().to(payroll::update_slip)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(payroll::get_payroll)))
                    .service(web::resource("/{id}/pay").route(web::put().to(payroll::pay_payroll)))
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(payroll::cancel_payroll)),
                    ),
            ),
    );
}
