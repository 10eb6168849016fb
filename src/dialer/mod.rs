//! Outbound dialing: single calls and sequenced bulk sessions.

pub mod dispatcher;
pub mod invoker;
pub mod progress;

pub use dispatcher::BulkDispatcher;
pub use invoker::{CallInvoker, PearlCallInvoker};
pub use progress::{BulkProgress, ProgressReceiver};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::{LeadStatus, LeadStore, NewLead};
    use crate::notify::Notifier;
    use crate::pearl::PearlClient;
    use crate::storage::{CampaignCredentials, CredentialStore, MemoryHistory, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Setup {
        dispatcher: BulkDispatcher,
        leads: LeadStore,
        credentials: CredentialStore,
        history: Arc<MemoryHistory>,
        ids: Vec<String>,
    }

    async fn setup(server: &MockServer, phones: &[&str]) -> Setup {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        credentials
            .save(&CampaignCredentials::new("out-1", "tok").with_campaign_id("camp-1"))
            .await
            .unwrap();

        let history = Arc::new(MemoryHistory::new());
        let client = PearlClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let invoker = PearlCallInvoker::new(client, credentials.clone(), history.clone());

        let leads = LeadStore::new();
        let mut ids = Vec::new();
        for phone in phones {
            let lead = leads
                .add(NewLead {
                    first_name: "Lead".to_string(),
                    last_name: phone.to_string(),
                    email: None,
                    phone_number: phone.to_string(),
                })
                .await
                .unwrap();
            ids.push(lead.id);
        }

        let dispatcher = BulkDispatcher::new(Arc::new(invoker), leads.clone(), Notifier::disconnected());

        Setup {
            dispatcher,
            leads,
            credentials,
            history,
            ids,
        }
    }

    async fn run_to_completion(setup: &Setup) {
        let mut rx = setup.dispatcher.subscribe();
        tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|p| !p.in_progress))
            .await
            .expect("session should finish")
            .unwrap();
    }

    const DELAY: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn three_successful_calls_append_history_in_order() {
        let server = MockServer::start().await;
        for (phone, id) in [("+1001", "req-a"), ("+1002", "req-b"), ("+1003", "req-c")] {
            Mock::given(method("POST"))
                .and(path("/Pearl/out-1/Call"))
                .and(body_partial_json(serde_json::json!({ "to": phone })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": id,
                    "from": "+1999",
                    "to": phone,
                    "queuePosition": 1
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let s = setup(&server, &["+1001", "+1002", "+1003"]).await;
        s.dispatcher.start(&s.ids, DELAY).await.unwrap();
        run_to_completion(&s).await;

        for id in &s.ids {
            assert_eq!(s.leads.get(id).await.unwrap().status, LeadStatus::Called);
        }
        let progress = s.dispatcher.progress();
        assert_eq!((progress.current_index, progress.total), (3, 3));
        assert!(!progress.in_progress);

        let records = s.history.records().await;
        let order: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["req-a", "req-b", "req-c"]);
        assert_eq!(records[0].lead_id, s.ids[0]);
        assert_eq!(records[2].from, "+1999");
    }

    #[tokio::test]
    async fn unauthorized_call_clears_credentials_and_fails_rest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Pearl/out-1/Call"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let s = setup(&server, &["+1001", "+1002"]).await;
        s.dispatcher.start(&s.ids, DELAY).await.unwrap();
        run_to_completion(&s).await;

        assert!(s.credentials.load().await.unwrap().is_none());
        for id in &s.ids {
            assert_eq!(s.leads.get(id).await.unwrap().status, LeadStatus::Failed);
        }
        assert_eq!(s.dispatcher.progress().current_index, 2);
        assert!(s.history.records().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_response_marks_lead_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Pearl/out-1/Call"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "queuePosition": 3 })))
            .mount(&server)
            .await;

        let s = setup(&server, &["+1001"]).await;
        s.dispatcher.start(&s.ids, DELAY).await.unwrap();
        run_to_completion(&s).await;

        assert_eq!(s.leads.get(&s.ids[0]).await.unwrap().status, LeadStatus::Failed);
        assert!(s.credentials.load().await.unwrap().is_some());
    }
}
