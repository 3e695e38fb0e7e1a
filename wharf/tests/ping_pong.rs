mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use wharf::error::Result;
use wharf::module::{Instance, Module};
use wharf::{Message, PType, SendFlags, ServiceApi};

struct ClientModule {
    echo_name: &'static str,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Module for ClientModule {
    fn create(&self) -> Instance {
        Box::new(())
    }
    fn init(&self, _inst: &mut Instance, api: &ServiceApi, _args: &str) -> Result<()> {
        let received = self.received.clone();
        api.set_callback(Box::new(move |_api, msg: Message| {
            received.lock().unwrap().push(msg.data.unwrap_or_default());
            false
        }));
        api.send_by_name(
            self.echo_name,
            PType::Text,
            0,
            Some(b"ping".to_vec()),
            SendFlags::NONE,
        )?;
        Ok(())
    }
}

#[test]
fn echo_service_replies_with_the_same_payload() {
    let (runtime, _echo) = common::boot_with_echo(2);
    let received = Arc::new(Mutex::new(Vec::new()));
    let client: &'static ClientModule = Box::leak(Box::new(ClientModule {
        echo_name: "test-echo",
        received: received.clone(),
    }));
    runtime.inner().modules.register("client", client);
    runtime.launch("client", "").expect("launch client");

    std::thread::sleep(Duration::from_millis(100));
    let got = received.lock().unwrap();
    assert_eq!(got.as_slice(), &[b"ping".to_vec()]);
}
