// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use coap_endpoint::prelude::*;
use coap_endpoint_tokio::{dial, serve_tcp, UdpTransport};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn hello_mux<P>() -> ServeMux<P> {
    let mut mux = ServeMux::new();
    mux.handle_fn("hello", |_peer, req: &Message| {
        let mut rsp = Message::new(MsgType::Ack, MsgCode::CONTENT, req.message_id);
        rsp.token = req.token;
        rsp.payload = b"hi there".to_vec();
        Some(rsp)
    });
    mux
}

#[tokio::test]
async fn udp_request_response() {
    let _ = env_logger::builder().is_test(true).try_init();

    let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let server_addr = transport.local_addr().unwrap();

    let server = Server::new(transport, hello_mux(), TransmissionParameters::default());
    tokio::spawn(async move { server.serve().await });

    let client = dial(server_addr).await.unwrap();
    let mut req = Message::new(MsgType::Con, MsgCode::GET, client.next_message_id());
    req.token = MsgToken::try_new(&[0x01, 0x02]).unwrap();
    req.set_path_string("/hello");

    let rsp = client.send(req).await.unwrap().unwrap();
    assert_eq!(rsp.code, MsgCode::CONTENT);
    assert_eq!(rsp.payload, b"hi there");
    assert_eq!(rsp.token.as_bytes(), &[0x01, 0x02]);
}

#[tokio::test]
async fn udp_not_found() {
    let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let server_addr = transport.local_addr().unwrap();

    let server = Server::new(transport, hello_mux(), TransmissionParameters::default());
    tokio::spawn(async move { server.serve().await });

    let client = dial(server_addr).await.unwrap();
    let mut req = Message::new(MsgType::Con, MsgCode::GET, client.next_message_id());
    req.set_path_string("/nowhere");

    let rsp = client.send(req).await.unwrap().unwrap();
    assert_eq!(rsp.code, MsgCode::NOT_FOUND);
    assert_eq!(rsp.msg_type, MsgType::Ack);
}

#[tokio::test]
async fn tcp_request_response() {
    let _ = env_logger::builder().is_test(true).try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap();
    tokio::spawn(serve_tcp(listener, Arc::new(hello_mux())));

    let mut stream = TcpStream::connect(server_addr).await.unwrap();

    let mut req = Message::new(MsgType::Con, MsgCode::GET, 0);
    req.token = MsgToken::try_new(&[0x0A]).unwrap();
    req.set_path_string("/hello");
    stream
        .write_all(&req.to_stream_bytes().unwrap())
        .await
        .unwrap();

    // Accumulate bytes until one complete framed message decodes.
    let mut queue = Vec::new();
    let mut chunk = [0u8; 256];
    let rsp = loop {
        if let Some((msg, _)) = Message::from_stream_head(&queue).unwrap() {
            break msg;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before a response arrived");
        queue.extend_from_slice(&chunk[..n]);
    };

    assert_eq!(rsp.code, MsgCode::CONTENT);
    assert_eq!(rsp.payload, b"hi there");
    assert_eq!(rsp.token.as_bytes(), &[0x0A]);
    assert_eq!(rsp.message_id, 0);
}
