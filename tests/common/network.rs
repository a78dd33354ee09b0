use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
};

use blockfs::{
    chain::ChainCamera,
    networking::{messages::Message, network::Network},
    types::{block::Block, data_types::CryptoHash},
};

/// The chain cameras of every started node, by peer index. Stands in for the request/response side of
/// the peer protocol.
type Registry = Arc<Mutex<HashMap<usize, ChainCamera>>>;

/// A mock network stub which passes messages from and to threads using channels, and answers block and
/// root requests by reading other nodes' chains directly.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    me: usize,
    all_peers: Vec<Sender<Message>>,
    inbox: Arc<Mutex<Receiver<Message>>>,
    registry: Registry,
}

impl NetworkStub {
    /// Make this node's chain visible to the block and root requests of every other node.
    pub(crate) fn register(&self, camera: ChainCamera) {
        self.registry.lock().unwrap().insert(self.me, camera);
    }

    fn other_cameras(&self) -> Vec<ChainCamera> {
        self.registry
            .lock()
            .unwrap()
            .iter()
            .filter(|(peer, _)| **peer != self.me)
            .map(|(_, camera)| camera.clone())
            .collect()
    }
}

impl Network for NetworkStub {
    fn broadcast(&mut self, message: Message) {
        for (peer, sender) in self.all_peers.iter().enumerate() {
            if peer != self.me {
                let _ = sender.send(message.clone());
            }
        }
    }

    fn recv(&mut self) -> Option<Message> {
        self.inbox.lock().unwrap().try_recv().ok()
    }

    fn get_remote_block(&mut self, hash: &CryptoHash) -> Option<Block> {
        self.other_cameras()
            .iter()
            .find_map(|camera| camera.block(hash))
    }

    fn get_remote_roots(&mut self) -> Vec<Block> {
        let mut roots: Vec<Block> = Vec::new();
        for camera in self.other_cameras() {
            for root in camera.roots() {
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
    }
}

pub(crate) fn mock_network(num_peers: usize) -> Vec<NetworkStub> {
    let registry = Registry::default();
    let (all_peers, inboxes): (Vec<Sender<Message>>, Vec<Receiver<Message>>) =
        (0..num_peers).map(|_| mpsc::channel()).unzip();

    inboxes
        .into_iter()
        .enumerate()
        .map(|(me, inbox)| NetworkStub {
            me,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
            registry: registry.clone(),
        })
        .collect()
}
