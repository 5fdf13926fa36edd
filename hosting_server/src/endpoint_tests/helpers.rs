use actix_web::{body::MessageBody, dev::ServiceResponse, http::StatusCode};
use hosting_engine::{
    notifications::{InAppChannel, NotificationDispatcher},
    test_utils::MemoryDatabase,
    LifecycleApi,
};

pub fn test_api(db: &MemoryDatabase) -> LifecycleApi<MemoryDatabase> {
    let mut dispatcher = NotificationDispatcher::new();
    dispatcher.add_channel(InAppChannel::new(db.clone()));
    LifecycleApi::new(db.clone(), dispatcher)
}

pub fn into_status_and_body(res: ServiceResponse) -> (StatusCode, String) {
    let (_, res) = res.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
