use tokio::sync::{mpsc, watch};

use elevatorpeers::world_view::{self, owner, StateChangeMessage};
use elevatorpeers::{config, init, peer_watch, print, utils};


#[tokio::main]
async fn main() {
    // Start a node with "cargo r -- <self_slot> [config.json]"
    let args = match init::parse_args() {
        Ok(args) => args,
        Err(e) => {
            print::err(format!("{:#}", e));
            std::process::exit(2);
        }
    };
    let peer_config = match init::build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            print::err(format!("{:#}", e));
            std::process::exit(1);
        }
    };
    let initial_map = match init::initialize_map(&peer_config) {
        Ok(map) => map,
        Err(e) => {
            print::err(format!("{:#}", e));
            std::process::exit(1);
        }
    };

    /* START ----------- Channels ---------------------- */
    let (map_watch_tx, map_watch_rx) = watch::channel(initial_map.clone());
    let (proposal_tx, proposal_rx) = mpsc::channel::<StateChangeMessage>(config::CHANNEL_CAPACITY);
    let (downstream_tx, mut downstream_rx) = mpsc::channel::<StateChangeMessage>(config::CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = utils::shutdown_channel();
    /* SLUTT ----------- Channels ---------------------- */

    print::elevator_map(&initial_map, "Startup");

    // Task som eig elevator map
    let owner_task = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            print::info("Starting elevator map owner".to_string());
            owner::update_map_watch(proposal_rx, map_watch_tx, Some(downstream_tx), shutdown_rx).await;
        })
    };

    // Stand-in for the order layer: report what it would redistribute
    let consumer_task = {
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = utils::shutdown_requested(&mut shutdown_rx) => break,
                    msg = downstream_rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                };
                let dead = msg.map().dead_slots();
                if dead.is_empty() {
                    print::ok(format!("{}: every elevator is alive", msg.reason()));
                } else {
                    print::warn(format!("{}: orders on slots {:?} need a new owner", msg.reason(), dead));
                }
            }
        })
    };

    let peers = peer_watch::start(&peer_config, map_watch_rx.clone(), proposal_tx);
    print::ok(format!("Listening for heartbeats on {} ports", peers.listen_ports().len()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        print::err(format!("Could not wait for ctrl-c: {}", e));
    }
    print::info("Shutting down".to_string());

    peers.stop().await;
    let _ = shutdown_tx.send(true);
    let _ = owner_task.await;
    let _ = consumer_task.await;

    print::elevator_map(&world_view::get_map(&map_watch_rx), "Final");
}
