use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::services::EventBus;

use super::soap;
use super::subscription::SubscriptionManager;

const DEFAULT_MESSAGE_LIMIT: usize = 10;

const ACTION_GET_CAPABILITIES: &str = "GetServiceCapabilities";
const ACTION_CREATE_SUBSCRIPTION: &str = "CreatePullPointSubscription";
const ACTION_PULL_MESSAGES: &str = "PullMessages";

/// ONVIF Events service: pull-point subscriptions over SOAP.
pub struct EventService {
    subscriptions: Arc<SubscriptionManager>,
    /// Externally reachable base URL embedded in subscription references.
    base_url: String,
    events_path: String,
    subscription_ttl: Duration,
}

impl EventService {
    pub fn new(
        subscriptions: Arc<SubscriptionManager>,
        base_url: String,
        events_path: String,
        subscription_ttl: Duration,
    ) -> Self {
        Self {
            subscriptions,
            base_url,
            events_path,
            subscription_ttl,
        }
    }

    /// POST {events_path}: capability query, subscription creation, and
    /// unaddressed PullMessages (served by any live pull point).
    pub async fn handle(
        State(service): State<Arc<EventService>>,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let xml = match operation(&headers, &body) {
            Some(ACTION_GET_CAPABILITIES) => service.get_capabilities(&body),
            Some(ACTION_CREATE_SUBSCRIPTION) => service.create_subscription(&body).await,
            Some(ACTION_PULL_MESSAGES) => service.pull_messages("", &body).await,
            other => {
                debug!(operation = ?other, "unsupported events operation");
                soap::fault("unsupported operation")
            }
        };
        soap_response(xml)
    }

    /// POST {events_path}/subscription/:id: PullMessages on a pull point.
    pub async fn handle_subscription(
        State(service): State<Arc<EventService>>,
        Path(id): Path<String>,
        headers: HeaderMap,
        body: String,
    ) -> Response {
        let xml = match operation(&headers, &body) {
            Some(ACTION_PULL_MESSAGES) => service.pull_messages(&id, &body).await,
            other => {
                debug!(operation = ?other, "unsupported subscription operation");
                soap::fault("unsupported operation")
            }
        };
        soap_response(xml)
    }

    fn get_capabilities(&self, body: &str) -> String {
        let relates_to = &soap::extract_message_id(body).unwrap_or_default();
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/events/wsdl/EventPortType/GetServiceCapabilitiesResponse",
                relates_to,
            ),
            "<tev:GetServiceCapabilitiesResponse xmlns:tev=\"http://www.onvif.org/ver10/events/wsdl\">\
             <tev:Capabilities WSSubscriptionPolicySupport=\"false\" \
             WSPullPointSupport=\"true\" WSPausableSubscriptionManagerInterfaceSupport=\"false\"/>\
             </tev:GetServiceCapabilitiesResponse>",
        )
    }

    async fn create_subscription(&self, body: &str) -> String {
        let subscription = self.subscriptions.create(self.subscription_ttl).await;
        info!(id = %subscription.id, "pull point created");

        let address = format!(
            "{}{}/subscription/{}",
            self.base_url, self.events_path, subscription.id
        );
        let relates_to = &soap::extract_message_id(body).unwrap_or_default();
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/events/wsdl/EventPortType/CreatePullPointSubscriptionResponse",
                relates_to,
            ),
            &format!(
                "<tev:CreatePullPointSubscriptionResponse xmlns:tev=\"http://www.onvif.org/ver10/events/wsdl\" \
                 xmlns:wsnt=\"http://docs.oasis-open.org/wsn/b-2\">\
                 <tev:SubscriptionReference>\
                 <wsa:Address>{}</wsa:Address>\
                 </tev:SubscriptionReference>\
                 <wsnt:CurrentTime>{}</wsnt:CurrentTime>\
                 <wsnt:TerminationTime>{}</wsnt:TerminationTime>\
                 </tev:CreatePullPointSubscriptionResponse>",
                soap::xml_escape(&address),
                soap::format_utc(OffsetDateTime::now_utc()),
                subscription.termination_time_utc(),
            ),
        )
    }

    async fn pull_messages(&self, id: &str, body: &str) -> String {
        // Some clients pull against the service URL instead of their
        // subscription reference; any live pull point serves those. A
        // request that names a subscription that does not resolve is a
        // client error, never another client's queue.
        let subscription = if id.is_empty() {
            self.subscriptions.first_active().await
        } else {
            self.subscriptions.get(id).await
        };
        let Some(subscription) = subscription else {
            return soap::fault("unknown subscription");
        };

        let limit = soap::extract_tag(body, "MessageLimit")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(DEFAULT_MESSAGE_LIMIT);
        let messages = subscription.pull_messages(limit).await;

        let relates_to = &soap::extract_message_id(body).unwrap_or_default();
        soap::envelope(
            &soap::reply_header(
                "http://www.onvif.org/ver10/events/wsdl/PullPointSubscription/PullMessagesResponse",
                relates_to,
            ),
            &format!(
                "<tev:PullMessagesResponse xmlns:tev=\"http://www.onvif.org/ver10/events/wsdl\" \
                 xmlns:wsnt=\"http://docs.oasis-open.org/wsn/b-2\">\
                 <tev:CurrentTime>{}</tev:CurrentTime>\
                 <tev:TerminationTime>{}</tev:TerminationTime>\
                 {}\
                 </tev:PullMessagesResponse>",
                soap::format_utc(OffsetDateTime::now_utc()),
                subscription.termination_time_utc(),
                messages.concat(),
            ),
        )
    }
}

/// Resolves the requested operation from the SOAPAction header, the
/// wsa:Action header block, or as a last resort the body element names.
fn operation<'a>(headers: &HeaderMap, body: &'a str) -> Option<&'a str> {
    let from_action = headers
        .get("SOAPAction")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| soap::extract_action(body));

    for name in [
        ACTION_GET_CAPABILITIES,
        ACTION_CREATE_SUBSCRIPTION,
        ACTION_PULL_MESSAGES,
    ] {
        if let Some(action) = &from_action {
            if action.contains(name) {
                return Some(name);
            }
        }
    }
    [
        ACTION_GET_CAPABILITIES,
        ACTION_CREATE_SUBSCRIPTION,
        ACTION_PULL_MESSAGES,
    ]
    .into_iter()
    .find(|name| body.contains(name))
}

fn soap_response(xml: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/soap+xml; charset=utf-8")],
        xml,
    )
        .into_response()
}

/// Renders a detector event as a WS-Notification message.
pub fn notification_xml(
    time: OffsetDateTime,
    device_id: &str,
    account: &str,
    picture_b64: &str,
) -> String {
    format!(
        "<wsnt:NotificationMessage xmlns:wsnt=\"http://docs.oasis-open.org/wsn/b-2\" \
         xmlns:tt=\"http://www.onvif.org/ver10/schema\">\
         <wsnt:Topic Dialect=\"http://www.onvif.org/ver10/tev/topicExpression/ConcreteSet\">\
         tns1:Detector/Event</wsnt:Topic>\
         <wsnt:Message><tt:Message UtcTime=\"{}\">\
         <tt:Source>\
         <tt:SimpleItem Name=\"Device\" Value=\"{}\"/>\
         <tt:SimpleItem Name=\"Account\" Value=\"{}\"/>\
         </tt:Source>\
         <tt:Data>\
         <tt:SimpleItem Name=\"Picture\" Value=\"{}\"/>\
         <tt:SimpleItem Name=\"Category\" Value=\"0\"/>\
         <tt:SimpleItem Name=\"Mesures\" Value=\"\"/>\
         </tt:Data>\
         </tt:Message></wsnt:Message>\
         </wsnt:NotificationMessage>",
        soap::format_utc(time),
        soap::xml_escape(device_id),
        soap::xml_escape(account),
        soap::xml_escape(picture_b64),
    )
}

/// Bridges the internal bus onto the pull points: every tick, new
/// detector events are rendered once and queued on every live
/// subscription. Returns the stop handle.
pub fn spawn_pump(
    bus: Arc<EventBus>,
    subscriptions: Arc<SubscriptionManager>,
    interval: Duration,
) -> oneshot::Sender<()> {
    let (stop_tx, mut stop_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut cursor = bus.head().await.unwrap_or(0);
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    info!("notification pump stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let batch = bus.pull(cursor, 64).await;
                    if let Some((seq, _)) = batch.last() {
                        cursor = *seq;
                    }
                    if !subscriptions.any_active().await {
                        continue;
                    }
                    for (_, event) in batch {
                        if event.topic != "detector/event" {
                            continue;
                        }
                        let picture = serde_json::from_slice::<serde_json::Value>(&event.payload)
                            .ok()
                            .and_then(|value| {
                                value.get("image").and_then(|v| v.as_str()).map(str::to_owned)
                            })
                            .unwrap_or_default();
                        let xml =
                            notification_xml(event.time, &event.device_id, "default", &picture);
                        subscriptions.broadcast(&xml).await;
                    }
                }
            }
        }
    });

    stop_tx
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_operation_from_soapaction_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "SOAPAction",
            "\"http://www.onvif.org/ver10/events/wsdl/EventPortType/CreatePullPointSubscription\""
                .parse()
                .unwrap(),
        );
        assert_eq!(operation(&headers, ""), Some(ACTION_CREATE_SUBSCRIPTION));
    }

    #[test]
    fn test_operation_from_body_action() {
        let body = "<s:Header><wsa:Action>http://.../PullMessages</wsa:Action></s:Header>";
        assert_eq!(operation(&HeaderMap::new(), body), Some(ACTION_PULL_MESSAGES));
    }

    #[test]
    fn test_operation_from_body_element() {
        let body = "<s:Body><tev:GetServiceCapabilities/></s:Body>";
        assert_eq!(
            operation(&HeaderMap::new(), body),
            Some(ACTION_GET_CAPABILITIES)
        );
    }

    #[test]
    fn test_operation_unknown() {
        assert_eq!(operation(&HeaderMap::new(), "<s:Body/>"), None);
    }

    #[test]
    fn test_notification_xml_contents() {
        let xml = notification_xml(datetime!(2024-03-05 17:20:01 UTC), "7001", "default", "QUJD");
        assert!(xml.contains("UtcTime=\"2024-03-05T17:20:01.000Z\""));
        assert!(xml.contains("Name=\"Device\" Value=\"7001\""));
        assert!(xml.contains("Name=\"Account\" Value=\"default\""));
        assert!(xml.contains("Name=\"Picture\" Value=\"QUJD\""));
        assert!(xml.contains("tns1:Detector/Event"));
    }
}
