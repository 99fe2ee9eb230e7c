use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::tasks_health,
        api::tasks::list_tasks,
        api::tasks::create_task,
        api::tasks::get_task,
        api::tasks::update_task,
        api::tasks::delete_task,
        api::reports::summary,
    ),
    tags(
        (name = "whattodo", description = "WhatToDo tasks API")
    )
)]
pub struct ApiDoc;
