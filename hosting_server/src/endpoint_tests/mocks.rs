use checkout_gateway::{CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError};
use mockall::mock;

mock! {
    pub Gateway {}
    impl CheckoutGateway for Gateway {
        async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
    }
}
