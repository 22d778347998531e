pub mod account;
pub mod assignment;
pub mod company;
pub mod dashboard;
pub mod project;
pub mod tag;

use actix_web::web;

use crate::response::form_error_handler;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(assignment::config)
        .configure(account::config)
        .service(web::scope("/dashboard").configure(dashboard::config))
        .service(web::scope("/projects").configure(project::config))
        .service(web::scope("/tags").configure(tag::config))
        .service(web::scope("/companies").configure(company::config));
}

pub fn form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(form_error_handler)
}
