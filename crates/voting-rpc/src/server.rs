use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::errors::RpcError;
use crate::handlers::RpcHandler;

/// The HTTP façade (§6's request API surface), grounded on the teacher's
/// `api_server.py` route table and extended with the voting-contract
/// methods that table's original single-candidate vote didn't need.
pub struct RpcServer {
    handler: Arc<RpcHandler>,
    port: u16,
}

impl RpcServer {
    pub fn new(handler: Arc<RpcHandler>, port: u16) -> Self {
        Self { handler, port }
    }

    pub async fn run(&self) {
        let handler = warp::any().map({
            let handler = Arc::clone(&self.handler);
            move || Arc::clone(&handler)
        });

        let create_contract = warp::path!("contracts")
            .and(warp::post())
            .and(warp::body::json())
            .and(handler.clone())
            .and_then(|body: CreateContractBody, handler: Arc<RpcHandler>| async move {
                reply_result(handler.create_contract(body.name).await)
            });

        let add_candidate = warp::path!("contracts" / String / "candidates")
            .and(warp::post())
            .and(warp::body::json())
            .and(handler.clone())
            .and_then(|name: String, body: CandidateBody, handler: Arc<RpcHandler>| async move {
                reply_result(handler.add_candidate(name, body.candidate).await)
            });

        let start_voting = warp::path!("contracts" / String / "start")
            .and(warp::post())
            .and(handler.clone())
            .and_then(|name: String, handler: Arc<RpcHandler>| async move {
                reply_result(handler.start_voting(name).await)
            });

        let vote = warp::path!("contracts" / String / "votes")
            .and(warp::post())
            .and(warp::body::json())
            .and(handler.clone())
            .and_then(|name: String, body: VoteBody, handler: Arc<RpcHandler>| async move {
                reply_result(handler.vote(name, body.subject, body.candidate).await)
            });

        let finish_voting = warp::path!("contracts" / String / "finish")
            .and(warp::post())
            .and(handler.clone())
            .and_then(|name: String, handler: Arc<RpcHandler>| async move {
                reply_result(handler.finish_voting(name).await)
            });

        let contract_results = warp::path!("contracts" / String / "results")
            .and(warp::get())
            .and(handler.clone())
            .and_then(|name: String, handler: Arc<RpcHandler>| async move {
                match handler.get_contract_results(&name).await {
                    Ok(results) => Ok(warp::reply::json(&results)),
                    Err(e) => Err(warp::reject::custom(RejectedRpc(e))),
                }
            });

        let register_validator = warp::path!("validators")
            .and(warp::post())
            .and(handler.clone())
            .and_then(|handler: Arc<RpcHandler>| async move {
                match handler.register_validator().await {
                    Ok(()) => Ok(warp::reply::with_status(
                        warp::reply::json(&ResultBody { result: "validator registered" }),
                        StatusCode::CREATED,
                    )),
                    Err(e) => Err(warp::reject::custom(RejectedRpc(e))),
                }
            });

        let get_validators = warp::path!("validators")
            .and(warp::get())
            .and(handler.clone())
            .and_then(|handler: Arc<RpcHandler>| async move {
                Ok::<_, Rejection>(warp::reply::json(&handler.get_validators().await))
            });

        let connect_to_peer = warp::path!("peers")
            .and(warp::post())
            .and(warp::body::json())
            .and(handler.clone())
            .and_then(|body: ConnectPeerBody, handler: Arc<RpcHandler>| async move {
                handler.connect_to_peer(body.host, body.port).await;
                Ok::<_, Rejection>(warp::reply::with_status(
                    warp::reply::json(&ResultBody { result: "connect requested" }),
                    StatusCode::ACCEPTED,
                ))
            });

        let get_peers = warp::path!("peers")
            .and(warp::get())
            .and(handler.clone())
            .and_then(|handler: Arc<RpcHandler>| async move {
                Ok::<_, Rejection>(warp::reply::json(&handler.get_peers().await))
            });

        let sync = warp::path!("sync")
            .and(warp::get())
            .and(handler.clone())
            .and_then(|handler: Arc<RpcHandler>| async move {
                handler.sync().await;
                Ok::<_, Rejection>(warp::reply::with_status(
                    warp::reply::json(&ResultBody { result: "sync requested" }),
                    StatusCode::ACCEPTED,
                ))
            });

        let get_chain = warp::path!("chain")
            .and(warp::get())
            .and(handler.clone())
            .and_then(|handler: Arc<RpcHandler>| async move {
                Ok::<_, Rejection>(warp::reply::json(&handler.get_chain().await))
            });

        let get_pending_transactions = warp::path!("transactions")
            .and(warp::get())
            .and(handler.clone())
            .and_then(|handler: Arc<RpcHandler>| async move {
                Ok::<_, Rejection>(warp::reply::json(&handler.get_pending_transactions().await))
            });

        let routes = create_contract
            .or(add_candidate)
            .or(start_voting)
            .or(vote)
            .or(finish_voting)
            .or(contract_results)
            .or(register_validator)
            .or(get_validators)
            .or(connect_to_peer)
            .or(get_peers)
            .or(sync)
            .or(get_chain)
            .or(get_pending_transactions)
            .recover(recover);

        tracing::info!(port = self.port, "RPC server listening");
        warp::serve(routes).run(([0, 0, 0, 0], self.port)).await;
    }
}

#[derive(Debug)]
struct RejectedRpc(RpcError);
impl warp::reject::Reject for RejectedRpc {}

fn reply_result(result: Result<voting_core::Status, RpcError>) -> Result<impl Reply, Rejection> {
    match result {
        Ok(status) => Ok(warp::reply::with_status(
            warp::reply::json(&StatusBody { status }),
            StatusCode::CREATED,
        )),
        Err(e) => Err(warp::reject::custom(RejectedRpc(e))),
    }
}

async fn recover(rejection: Rejection) -> Result<impl Reply, Infallible> {
    if rejection.is_not_found() {
        return Ok(warp::reply::with_status(
            warp::reply::json(&ResultBody { result: "not found" }),
            StatusCode::NOT_FOUND,
        ));
    }
    if let Some(RejectedRpc(e)) = rejection.find() {
        let status = match e {
            RpcError::UnknownContract(_) => StatusCode::NOT_FOUND,
            RpcError::InvalidPublicKey(_) => StatusCode::BAD_REQUEST,
            RpcError::ValidatorAlreadyRegistered => StatusCode::CONFLICT,
            RpcError::Contract(_) => StatusCode::CONFLICT,
            RpcError::Chain(_) | RpcError::Crypto(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        return Ok(warp::reply::with_status(
            warp::reply::json(&ResultBody { result: "request rejected" }),
            status,
        ));
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&ResultBody { result: "bad request" }),
        StatusCode::BAD_REQUEST,
    ))
}

#[derive(Deserialize)]
struct CreateContractBody {
    name: String,
}

#[derive(Deserialize)]
struct CandidateBody {
    candidate: String,
}

#[derive(Deserialize)]
struct VoteBody {
    subject: String,
    candidate: String,
}

#[derive(Deserialize)]
struct ConnectPeerBody {
    host: String,
    port: u16,
}

#[derive(Serialize)]
struct ResultBody {
    result: &'static str,
}

#[derive(Serialize)]
struct StatusBody {
    status: voting_core::Status,
}
