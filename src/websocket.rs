use crate::agent::{ AgentError, ChatAgent };
use crate::models::websocket::{ ClientMessage, ServerMessage };
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };
use uuid::Uuid;
const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

type WsSink<S> = Arc<Mutex<SplitSink<WebSocketStream<S>, Message>>>;

async fn send_message<S>(tx: &WsSink<S>, message: &ServerMessage) -> bool
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    tx.lock().await.send(Message::Text(json)).await.is_ok()
}

/// Runs one chat turn and maps the outcome to the frame sent back, if any.
async fn respond_to_chat(agent: &ChatAgent, content: &str) -> Option<ServerMessage> {
    match agent.process_message(content).await {
        Ok(reply) =>
            Some(ServerMessage::Response {
                content: reply,
                timestamp: Utc::now().timestamp_millis(),
            }),
        Err(AgentError::StaleReply) => {
            info!("Reply dropped: conversation was cleared while it was generated");
            None
        }
        Err(AgentError::EmptyMessage) => None,
        Err(e) => {
            error!("Agent processing error: {}", e);
            Some(ServerMessage::Error {
                message: agent.prompt_config().error_message.clone(),
            })
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<ChatAgent>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let connection_id = Uuid::new_v4();
    info!("New WebSocket connection: {} (ID {})", peer, connection_id);

    let (tx, mut rx) = websocket.split();
    let tx: WsSink<S> = Arc::new(Mutex::new(tx));

    let history = ServerMessage::History {
        messages: agent.history().await,
    };
    if !send_message(&tx, &history).await {
        error!("Failed to send history to {}", peer);
        return;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let error_msg = ServerMessage::Error {
                message: "Message too large".to_string(),
            };
            if !send_message(&tx, &error_msg).await {
                error!("Failed to send size limit error to {}", peer);
            }
            break;
        }

        match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Chat { content }) => {
                        if content.trim().is_empty() {
                            warn!("Ignoring empty chat message from {}", peer);
                            continue;
                        }
                        if !send_message(&tx, &ServerMessage::Processing).await {
                            error!("Error sending processing status to {}", peer);
                            break;
                        }

                        // The turn runs in its own task so a `clear` on this
                        // connection is still handled while the model answers.
                        let agent = Arc::clone(&agent);
                        let tx = Arc::clone(&tx);
                        tokio::spawn(async move {
                            if let Some(reply) = respond_to_chat(&agent, &content).await {
                                if !send_message(&tx, &reply).await {
                                    error!("Error sending reply to {}", peer);
                                }
                            }
                        });
                    }
                    Ok(ClientMessage::Clear) => {
                        agent.clear().await;
                        if !send_message(&tx, &ServerMessage::Cleared).await {
                            error!("Error sending clear confirmation to {}", peer);
                            break;
                        }
                    }
                    Ok(ClientMessage::NewChat) => {
                        let greeting = ServerMessage::Response {
                            content: agent.prompt_config().new_chat_message.clone(),
                            timestamp: Utc::now().timestamp_millis(),
                        };
                        if !send_message(&tx, &greeting).await {
                            error!("Error sending greeting to {}", peer);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let error_msg = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        if !send_message(&tx, &error_msg).await {
                            error!("Error sending parse error to {}", peer);
                            break;
                        }
                    }
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if tx.lock().await.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    info!("WebSocket connection closed for {} (ID {})", peer, connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::PromptConfig;
    use crate::llm::chat::{ ChatClient, CompletionResponse };
    use crate::memory::{ ConversationStore, MemoryConfig };
    use crate::models::chat::Role;
    use async_trait::async_trait;
    use std::error::Error as StdError;

    struct EchoChatClient;

    #[async_trait]
    impl ChatClient for EchoChatClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Ok(CompletionResponse { response: "hi there".to_string() })
        }

        fn get_model(&self) -> String {
            "echo".to_string()
        }
    }

    async fn next_frame<S>(ws: &mut WebSocketStream<S>) -> ServerMessage
        where S: AsyncRead + AsyncWrite + Unpin
    {
        loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn chat_and_clear_over_websocket() {
        let mut store = ConversationStore::in_memory(MemoryConfig::default());
        store.add_message_at(Role::User, "from last session", 1).await;
        let agent = Arc::new(
            ChatAgent::new(
                Arc::new(EchoChatClient),
                Arc::new(PromptConfig::default()),
                store,
                3000,
                10
            )
        );

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server_agent = Arc::clone(&agent);
        let server = tokio::spawn(async move {
            let ws = tokio_tungstenite::accept_async(server_io).await.unwrap();
            handle_connection("127.0.0.1:9000".parse().unwrap(), ws, server_agent).await;
        });
        let (mut ws, _) = tokio_tungstenite::client_async("ws://localhost/", client_io).await.unwrap();

        match next_frame(&mut ws).await {
            ServerMessage::History { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].content, "from last session");
            }
            other => panic!("expected history, got {:?}", other),
        }

        ws.send(Message::Text(r#"{"type":"chat","content":"hello"}"#.to_string())).await.unwrap();
        assert!(matches!(next_frame(&mut ws).await, ServerMessage::Processing));
        match next_frame(&mut ws).await {
            ServerMessage::Response { content, .. } => assert_eq!(content, "hi there"),
            other => panic!("expected response, got {:?}", other),
        }
        assert_eq!(agent.history().await.len(), 3);

        ws.send(Message::Text(r#"{"type":"clear"}"#.to_string())).await.unwrap();
        assert!(matches!(next_frame(&mut ws).await, ServerMessage::Cleared));
        assert!(agent.history().await.is_empty());

        ws.send(Message::Text(r#"{"type":"new_chat"}"#.to_string())).await.unwrap();
        match next_frame(&mut ws).await {
            ServerMessage::Response { content, .. } =>
                assert_eq!(content, PromptConfig::default().new_chat_message),
            other => panic!("expected greeting, got {:?}", other),
        }

        ws.send(Message::Text("not json".to_string())).await.unwrap();
        assert!(matches!(next_frame(&mut ws).await, ServerMessage::Error { .. }));

        ws.close(None).await.unwrap();
        server.await.unwrap();
    }
}
