//! End-to-end coverage for the five literal swap scenarios plus the hop
//! tunnel-loss boundary case, each driven through [`ManagerRegistry`]
//! exactly as a real overlay node would see it.

use crate::amount::{CurrencyCode, Fraction};
use crate::contract::ContractRegistry;
use crate::manager::{Collaborators, Disposition};
use crate::manager::PayeeManager;
use crate::order::{Order, OrderKind, OrderPurpose};
use crate::registry::ManagerRegistry;
use crate::router::InMemoryRouter;
use crate::testing::{InMemoryLedger, InMemoryOrderBook, InMemoryWallet, RecordingPeerService};
use crate::wire::{
    build_vote_yes_payload, BtcAddress, BtcTxId, Direction, OrderId, PeerId, TxPhase,
    VirtualAddress, WireItem, VOTE_NO_PAYLOAD,
};

fn usd() -> CurrencyCode {
    CurrencyCode::new("USD")
}

fn frac(num: i64, den: i64) -> Fraction {
    Fraction::new(num, den).unwrap()
}

fn bid(amount: Fraction) -> Order {
    Order {
        order_id: OrderId::new("bid-1"),
        kind: OrderKind::Bid,
        currency: usd(),
        price: frac(100, 1),
        amount,
        btc_address: BtcAddress::new("addr-alice-unused"),
        commitment: Fraction::ZERO,
        locked: false,
        ignored: false,
        purpose: OrderPurpose::New,
    }
}

fn ask(amount: Fraction, price: Fraction) -> Order {
    Order {
        order_id: OrderId::new("ask-1"),
        kind: OrderKind::Ask,
        currency: usd(),
        price,
        amount,
        btc_address: BtcAddress::new("addr-carol"),
        commitment: Fraction::ZERO,
        locked: false,
        ignored: false,
        purpose: OrderPurpose::New,
    }
}

/// One overlay node's private state: its own registry and every
/// collaborator it needs, all in-memory.
struct Node {
    id: PeerId,
    registry: ManagerRegistry,
    order_book: InMemoryOrderBook,
    ledger: InMemoryLedger,
    wallet: InMemoryWallet,
    peers: RecordingPeerService,
    router: InMemoryRouter,
    contracts: ContractRegistry,
}

impl Node {
    fn new(name: &str, next_hops: Vec<(VirtualAddress, PeerId)>) -> Self {
        Node {
            id: PeerId::new(name),
            registry: ManagerRegistry::new(),
            order_book: InMemoryOrderBook::new(Vec::new()),
            ledger: InMemoryLedger::new(),
            wallet: InMemoryWallet::new(),
            peers: RecordingPeerService::new(),
            router: InMemoryRouter::new(next_hops),
            contracts: ContractRegistry::new(),
        }
    }

    fn collab(&self) -> Collaborators<'_> {
        Collaborators {
            router: &self.router,
            wallet: &self.wallet,
            peers: &self.peers,
            order_book: &self.order_book,
            ledger: &self.ledger,
            contracts: &self.contracts,
        }
    }
}

/// Drains every item `from` sent and delivers it to `to`, one hop of the
/// relay at a time. Panics if `to` raises a dispatch error, since none of
/// these scenarios exercises a routing/protocol failure mid-relay.
fn relay(from: &Node, to: &Node) -> Vec<Disposition> {
    from.peers
        .drain()
        .into_iter()
        .map(|(dest, item)| {
            assert_eq!(dest, to.id, "item addressed to the wrong node");
            to.registry
                .dispatch(from.id.clone(), item, &to.collab())
                .expect("dispatch should not fail in a clean relay")
        })
        .collect()
}

/// Builds the three-node chain (alice -> bob -> carol) used by scenarios
/// 1 and 2, with bob a pure credit relay and carol holding `carol_ask`.
fn three_node_chain(carol_ask: Order) -> (Node, Node, Node) {
    let addr = VirtualAddress::new(carol_ask.order_id.as_str());
    let alice = Node::new("alice", vec![(addr.clone(), PeerId::new("bob"))]);
    let bob = Node::new("bob", vec![(addr, PeerId::new("carol"))]);
    let carol = Node::new("carol", Vec::new());
    carol.order_book.update_order(&carol_ask);
    carol.ledger.set_available(&bob.id, &usd(), frac(1_000_000, 1));
    (alice, bob, carol)
}

#[test]
fn scenario_1_happy_path_exact_fill() {
    let (alice, bob, carol) = three_node_chain(ask(frac(1, 1), frac(100, 1)));

    let disposition = alice
        .registry
        .start_coordinator(ask(frac(1, 1), frac(100, 1)), bid(frac(1, 1)), frac(1, 1), &alice.collab())
        .unwrap();
    assert_eq!(disposition, Disposition::Continue);

    relay(&alice, &bob); // QUERY alice -> bob
    relay(&bob, &carol); // QUERY bob -> carol, carol votes YES
    relay(&carol, &bob); // VOTE_YES carol -> bob
    relay(&bob, &alice); // VOTE_YES bob -> alice, alice commits
    relay(&alice, &bob); // COMMIT alice -> bob
    relay(&bob, &carol); // COMMIT bob -> carol, carol broadcasts

    assert!(alice.order_book.get(&OrderId::new("bid-1")).is_none());
    assert!(carol.order_book.get(&OrderId::new("ask-1")).is_none());
    assert_eq!(carol.wallet.broadcast().len(), 1);
    assert_eq!(bob.contracts.len(), 2);
    assert_eq!(alice.contracts.len(), 1);
    assert_eq!(carol.contracts.len(), 1);
}

#[test]
fn scenario_2_partial_fill_downstream_reduction() {
    // Coordinator asks for 2 BTC; the payee's ask only has 1 BTC left.
    let (alice, bob, carol) = three_node_chain(ask(frac(1, 1), frac(100, 1)));

    alice
        .registry
        .start_coordinator(ask(frac(1, 1), frac(100, 1)), bid(frac(2, 1)), frac(2, 1), &alice.collab())
        .unwrap();

    relay(&alice, &bob);
    relay(&bob, &carol);
    relay(&carol, &bob);
    relay(&bob, &alice);
    relay(&alice, &bob);
    relay(&bob, &carol);

    let settled_bid = alice.order_book.get(&OrderId::new("bid-1")).unwrap();
    assert_eq!(settled_bid.purpose, OrderPurpose::PartlyFilled);
    assert_eq!(settled_bid.amount, frac(1, 1));
    assert!(!settled_bid.locked);

    assert!(carol.order_book.get(&OrderId::new("ask-1")).is_none());
    assert_eq!(carol.wallet.broadcast().len(), 1);
}

#[test]
fn scenario_3_credit_limited_clamp() {
    let ask_order = ask(frac(10, 1), frac(100, 1));
    let hop = PeerId::new("bob");
    let order_book = InMemoryOrderBook::new(Vec::new());
    let ledger = InMemoryLedger::new();
    ledger.set_available(&hop, &usd(), frac(50, 1));
    let wallet = InMemoryWallet::new();
    let peers = RecordingPeerService::new();
    let router = InMemoryRouter::new(Vec::new());
    let contracts = ContractRegistry::new();
    let collab = Collaborators {
        router: &router,
        wallet: &wallet,
        peers: &peers,
        order_book: &order_book,
        ledger: &ledger,
        contracts: &contracts,
    };

    let query = WireItem::new(
        VirtualAddress::new(ask_order.order_id.as_str()),
        TxPhase::Query,
        Direction::Server,
        "bid-1",
        "100/1:USD:addrD:1/1:0/1",
    );

    let (_mgr, disposition) = PayeeManager::on_query(&hop, &query, ask_order, &collab).unwrap();
    assert_eq!(disposition, Disposition::Continue);

    let sent = peers.drain();
    assert_eq!(sent.len(), 1);
    let (to, reply) = &sent[0];
    assert_eq!(*to, hop);
    assert_eq!(reply.phase, TxPhase::VoteYes);
    assert_eq!(
        reply.payload,
        build_vote_yes_payload(frac(1, 2), &BtcTxId::new("tx:addr-carol:addrD"))
    );
}

#[test]
fn scenario_4_price_cheat_votes_no() {
    let ask_order = ask(frac(10, 1), frac(100, 1));
    let hop = PeerId::new("bob");
    let order_book = InMemoryOrderBook::new(Vec::new());
    let ledger = InMemoryLedger::new();
    ledger.set_available(&hop, &usd(), frac(1_000_000, 1));
    let wallet = InMemoryWallet::new();
    let peers = RecordingPeerService::new();
    let router = InMemoryRouter::new(Vec::new());
    let contracts = ContractRegistry::new();
    let collab = Collaborators {
        router: &router,
        wallet: &wallet,
        peers: &peers,
        order_book: &order_book,
        ledger: &ledger,
        contracts: &contracts,
    };

    // Implied price 90/1, undercutting the resting ask's 100/1.
    let query = WireItem::new(
        VirtualAddress::new(ask_order.order_id.as_str()),
        TxPhase::Query,
        Direction::Server,
        "bid-1",
        "90/1:USD:addrD:1/1:0/1",
    );

    let (_mgr, disposition) = PayeeManager::on_query(&hop, &query, ask_order, &collab).unwrap();
    assert_eq!(disposition, Disposition::Finish);

    let sent = peers.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.phase, TxPhase::VoteNo);
    assert_eq!(sent[0].1.payload, VOTE_NO_PAYLOAD);
}

#[test]
fn scenario_5_seller_increase_aborts_and_rolls_back() {
    let alice = Node::new("alice", vec![(VirtualAddress::new("ask-1"), PeerId::new("bob"))]);
    alice.order_book.update_order(&ask(frac(1, 1), frac(100, 1)));

    alice
        .registry
        .start_coordinator(
            ask(frac(1, 1), frac(100, 1)),
            bid(frac(1, 1)),
            frac(1, 1),
            &alice.collab(),
        )
        .unwrap();
    alice.peers.drain(); // discard the QUERY

    // The seller votes YES claiming double the requested amount.
    let malicious_vote = WireItem::new(
        VirtualAddress::new("ask-1"),
        TxPhase::VoteYes,
        Direction::Client,
        "bid-1",
        "2/1:txCheat",
    );
    let disposition = alice
        .registry
        .dispatch(PeerId::new("bob"), malicious_vote, &alice.collab())
        .unwrap();
    assert_eq!(disposition, Disposition::Failure);

    let rolled_back_bid = alice.order_book.get(&OrderId::new("bid-1")).unwrap();
    assert!(rolled_back_bid.ignored);
    assert!(alice.order_book.get(&OrderId::new("ask-1")).is_none());
    assert!(alice.contracts.is_empty());

    let sent = alice.peers.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.phase, TxPhase::Abort);
}

#[test]
fn scenario_6_hop_tunnel_loss_on_commit() {
    let addr = VirtualAddress::new("ask-1");
    let alice = PeerId::new("alice");
    let carol = PeerId::new("carol");

    // Bob is the intermediate hop; driven entirely through its registry's
    // dispatch, exactly as a real overlay node would see it.
    let registry = ManagerRegistry::new();
    let order_book = InMemoryOrderBook::new(Vec::new());
    let ledger = InMemoryLedger::new();
    let wallet = InMemoryWallet::new();
    let peers = RecordingPeerService::new();
    let contracts = ContractRegistry::new();

    // QUERY and VOTE_YES go through with a router that records the tunnel.
    let live_router = InMemoryRouter::new(vec![(addr.clone(), carol.clone())]);
    let live_collab = Collaborators {
        router: &live_router,
        wallet: &wallet,
        peers: &peers,
        order_book: &order_book,
        ledger: &ledger,
        contracts: &contracts,
    };

    let query = WireItem::new(
        addr.clone(),
        TxPhase::Query,
        Direction::Server,
        "bid-1",
        "100/1:USD:addrD:1/1:0/1",
    );
    let disposition = registry.dispatch(alice.clone(), query, &live_collab).unwrap();
    assert_eq!(disposition, Disposition::Continue);
    peers.drain();

    let vote = WireItem::new(addr.clone(), TxPhase::VoteYes, Direction::Client, "bid-1", "1/1:txABCD");
    let disposition = registry.dispatch(carol, vote, &live_collab).unwrap();
    assert_eq!(disposition, Disposition::Continue);
    peers.drain();

    // The tunnel is lost before COMMIT arrives: use a fresh, empty router.
    let empty_router = InMemoryRouter::new(Vec::new());
    let lossy_collab = Collaborators {
        router: &empty_router,
        wallet: &wallet,
        peers: &peers,
        order_book: &order_book,
        ledger: &ledger,
        contracts: &contracts,
    };
    let commit = WireItem::new(addr, TxPhase::Commit, Direction::Server, "bid-1", "");
    let disposition = registry.dispatch(alice, commit, &lossy_collab).unwrap();
    assert_eq!(disposition, Disposition::Failure);

    assert!(peers.drain().is_empty());
    assert_eq!(contracts.len(), 2); // neither leg persisted, but neither removed
}
