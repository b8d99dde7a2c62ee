use crate::{
    config::{Config, NodeConfig},
    error::NodeResult,
};
use futures::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{
        client::IntoClientRequest,
        error::Error as TungsteniteError,
        http::HeaderValue,
        protocol::{CloseFrame, WebSocketConfig},
        Message,
    },
    MaybeTlsStream,
    WebSocketStream,
};
use tracing::{debug, instrument, trace};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Performs the websocket handshake with a node.
#[instrument(skip(client))]
pub(crate) async fn connect(node: &NodeConfig, client: &Config) -> NodeResult<WsStream> {
    let url = node.ws_url()?;
    let mut request = url.as_str().into_client_request()?;

    let headers = request.headers_mut();
    headers.insert("Authorization", HeaderValue::from_str(&node.password)?);
    headers.insert("User-Id", HeaderValue::from_str(&client.user_id.to_string())?);
    headers.insert("Client-Name", HeaderValue::from_str(&client.client_name)?);
    if let Some(key) = &node.resume_key {
        headers.insert("Resume-Key", HeaderValue::from_str(key)?);
    }

    let (stream, response) = tokio_tungstenite::connect_async_with_config(
        request,
        Some(WebSocketConfig {
            max_message_size: None,
            max_frame_size: None,
            ..Default::default()
        }),
        true,
    )
    .await?;

    debug!("Connected to {}: {:?}.", url, response.status());
    trace!("Handshake response headers: {:?}.", response.headers());

    Ok(stream)
}

/// Why a node's read half stopped yielding frames.
#[derive(Debug)]
pub(crate) enum ReadError {
    Ws(TungsteniteError),
    WsClosed(Option<CloseFrame<'static>>),
    Ended,
}

/// Extracts a text frame from one read of the websocket.
#[inline]
pub(crate) fn convert_ws_message(
    message: Option<Result<Message, TungsteniteError>>,
) -> Result<Option<String>, ReadError> {
    Ok(match message {
        Some(Ok(Message::Text(payload))) => Some(payload),
        Some(Ok(Message::Binary(bytes))) => {
            debug!("Ignoring unexpected binary frame of {} bytes.", bytes.len());
            None
        },
        Some(Ok(Message::Close(frame))) => {
            return Err(ReadError::WsClosed(frame));
        },
        Some(Err(e)) => {
            return Err(ReadError::Ws(e));
        },
        None => {
            return Err(ReadError::Ended);
        },
        // Ping/Pong message behaviour is internally handled by tungstenite.
        _ => None,
    })
}
