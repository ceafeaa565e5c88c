use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use whistle_core::proto::{Envelope, Request, Response};

pub type FramedStream = Framed<tokio::net::UnixStream, LengthDelimitedCodec>;

pub fn framed(stream: tokio::net::UnixStream) -> FramedStream {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub async fn send_request(framed: &mut FramedStream, req: &Envelope<Request>) -> io::Result<()> {
    send_json(framed, req).await
}

pub async fn send_response(framed: &mut FramedStream, resp: &Envelope<Response>) -> io::Result<()> {
    send_json(framed, resp).await
}

/// Next request from a client, or `None` once the client hung up.
pub async fn read_request(framed: &mut FramedStream) -> io::Result<Option<Envelope<Request>>> {
    read_json(framed).await
}

pub async fn read_response(framed: &mut FramedStream) -> io::Result<Envelope<Response>> {
    read_json(framed)
        .await?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "socket closed"))
}

async fn send_json<T: Serialize>(framed: &mut FramedStream, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    framed.send(tokio_util::bytes::Bytes::from(bytes)).await
}

async fn read_json<T: DeserializeOwned>(framed: &mut FramedStream) -> io::Result<Option<T>> {
    let Some(frame) = framed.next().await else {
        return Ok(None);
    };
    let frame = frame?;
    serde_json::from_slice::<T>(&frame)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_and_response_cross_the_socket() {
        let (a, b) = tokio::net::UnixStream::pair().unwrap();
        let mut client = framed(a);
        let mut server = framed(b);

        let req = Envelope { id: 3, payload: Request::Backup {} };
        send_request(&mut client, &req).await.unwrap();

        let got = read_request(&mut server).await.unwrap().expect("request frame");
        assert_eq!(got.id, 3);
        assert!(matches!(got.payload, Request::Backup {}));

        let resp = Envelope { id: got.id, payload: Response::ShutdownAck {} };
        send_response(&mut server, &resp).await.unwrap();
        let back = read_response(&mut client).await.unwrap();
        assert_eq!(back.id, 3);
        assert!(matches!(back.payload, Response::ShutdownAck {}));
    }

    #[tokio::test]
    async fn hangup_ends_the_request_stream() {
        let (a, b) = tokio::net::UnixStream::pair().unwrap();
        let mut server = framed(b);
        drop(a);
        assert!(read_request(&mut server).await.unwrap().is_none());
    }
}
