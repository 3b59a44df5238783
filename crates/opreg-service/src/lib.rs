//! Tonic server implementation bridging `opreg_query::Querier` to the wire
//! schema in `opreg_proto::catalog`.
//!
//! `rusqlite` is a blocking API, so every RPC hands its query work to
//! `spawn_blocking` rather than holding the async runtime thread, the same
//! division the teacher draws between its async connector loop and the
//! blocking SQLite work underneath `derive-sqlite`. Streaming methods push
//! records through a bounded channel as they're produced and check a
//! shared cancellation token between records, so a client that goes away
//! mid-stream stops the blocking thread from enumerating the rest of a
//! large catalog.

mod convert;

use futures::Stream;
use opreg_model::{Api, ChannelEntry, ChannelName, CsvName, PackageName};
use opreg_proto::catalog::{
    self as proto,
    catalog_server::Catalog,
    Bundle as ProtoBundle, ChannelEntry as ProtoChannelEntry, GetAllProvidersRequest, GetAllReplacementsRequest,
    GetBundleInChannelRequest, GetBundleRequest, GetDefaultProviderRequest, GetLatestProvidersRequest, GetPackageRequest,
    GetReplacementRequest, ListBundlesRequest, ListPackagesRequest, Package as ProtoPackage, PackageName as ProtoPackageName,
};
use opreg_query::{QueryError, Querier, SqlQuerier};
use opreg_store::Store;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Bounded channel capacity for streaming RPCs; a slow client applies
/// backpressure to the blocking query thread rather than the service
/// buffering an entire catalog in memory.
const STREAM_BUFFER: usize = 32;

pub struct CatalogService {
    store: Arc<Store>,
    shutdown: CancellationToken,
}

impl CatalogService {
    pub fn new(store: Arc<Store>, shutdown: CancellationToken) -> Self {
        Self { store, shutdown }
    }

    async fn unary_query<T, F>(&self, query: F) -> Result<T, Status>
    where
        F: FnOnce(&SqlQuerier<'_>) -> opreg_query::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let querier = SqlQuerier::new(&store);
            query(&querier)
        })
        .await
        .map_err(|err| Status::internal(format!("query task panicked: {err}")))?
        .map_err(query_error_to_status)
    }

    fn stream_query<T, P, F, M>(&self, query: F, to_proto: M) -> Pin<Box<dyn Stream<Item = Result<P, Status>> + Send>>
    where
        F: FnOnce(&SqlQuerier<'_>) -> opreg_query::Result<Vec<T>> + Send + 'static,
        M: Fn(&SqlQuerier<'_>, T) -> P + Send + 'static,
        T: Send + 'static,
        P: Send + 'static,
    {
        let store = self.store.clone();
        let shutdown = self.shutdown.clone();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::task::spawn_blocking(move || {
            let querier = SqlQuerier::new(&store);
            match query(&querier) {
                Ok(items) => {
                    for item in items {
                        if shutdown.is_cancelled() {
                            break;
                        }
                        let proto_item = to_proto(&querier, item);
                        if tx.blocking_send(Ok(proto_item)).is_err() {
                            break;
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.blocking_send(Err(query_error_to_status(err)));
                }
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}

/// Resolves a `ChannelEntry`'s internal `replaces` link to the CSV name
/// the wire schema expects, logging rather than failing the whole stream
/// if a single entry's link turns out to be dangling — that's a data
/// integrity question for the store, not a reason to abort every other
/// row already in flight.
fn entry_with_resolved_replaces(querier: &SqlQuerier<'_>, entry: ChannelEntry) -> ProtoChannelEntry {
    let replaces = entry.replaces.and_then(|id| match querier.bundle_name_for_entry(id) {
        Ok(name) => Some(name.to_string()),
        Err(err) => {
            tracing::warn!(entry_id = %id, error = %err, "channel entry names a replaces link that does not resolve");
            None
        }
    });
    convert::entry_to_proto(&entry, replaces.as_deref())
}

fn query_error_to_status(err: QueryError) -> Status {
    match err {
        QueryError::NotFound(msg) => Status::not_found(msg),
        QueryError::Ambiguous(msg) => Status::failed_precondition(msg),
        QueryError::Corrupt(name, detail) => Status::data_loss(format!("{name}: {detail}")),
        QueryError::Sqlite(err) => Status::internal(err.to_string()),
        QueryError::Graph(err) => Status::internal(err.to_string()),
    }
}

#[tonic::async_trait]
impl Catalog for CatalogService {
    type ListPackagesStream = Pin<Box<dyn Stream<Item = Result<ProtoPackageName, Status>> + Send>>;
    type GetChannelEntriesThatReplaceStream = Pin<Box<dyn Stream<Item = Result<ProtoChannelEntry, Status>> + Send>>;
    type GetChannelEntriesThatProvideStream = Pin<Box<dyn Stream<Item = Result<ProtoChannelEntry, Status>> + Send>>;
    type GetLatestChannelEntriesThatProvideStream = Pin<Box<dyn Stream<Item = Result<ProtoChannelEntry, Status>> + Send>>;
    type ListBundlesStream = Pin<Box<dyn Stream<Item = Result<ProtoBundle, Status>> + Send>>;

    async fn list_packages(&self, _request: Request<ListPackagesRequest>) -> Result<Response<Self::ListPackagesStream>, Status> {
        let stream = self.stream_query(|q| q.list_packages(), |_, name| ProtoPackageName { name: name.to_string() });
        Ok(Response::new(stream))
    }

    async fn get_package(&self, request: Request<GetPackageRequest>) -> Result<Response<ProtoPackage>, Status> {
        let name = PackageName::new(request.into_inner().name);
        let package = self.unary_query(move |q| q.get_package(&name)).await?;
        Ok(Response::new(convert::package_to_proto(package)))
    }

    async fn get_bundle(&self, request: Request<GetBundleRequest>) -> Result<Response<ProtoBundle>, Status> {
        let GetBundleRequest { pkg_name, channel_name, csv_name } = request.into_inner();
        let (package, channel, csv) = (PackageName::new(pkg_name), ChannelName::new(channel_name.clone()), CsvName::new(csv_name));
        let bundle = self.unary_query(move |q| q.get_bundle(&package, &channel, &csv)).await?;
        Ok(Response::new(convert::bundle_to_proto(bundle, &channel_name)))
    }

    async fn get_bundle_for_channel(&self, request: Request<GetBundleInChannelRequest>) -> Result<Response<ProtoBundle>, Status> {
        let GetBundleInChannelRequest { pkg_name, channel_name } = request.into_inner();
        let (package, channel) = (PackageName::new(pkg_name), ChannelName::new(channel_name.clone()));
        let bundle = self.unary_query(move |q| q.get_bundle_for_channel(&package, &channel)).await?;
        Ok(Response::new(convert::bundle_to_proto(bundle, &channel_name)))
    }

    async fn get_channel_entries_that_replace(
        &self,
        request: Request<GetAllReplacementsRequest>,
    ) -> Result<Response<Self::GetChannelEntriesThatReplaceStream>, Status> {
        let csv = CsvName::new(request.into_inner().csv_name);
        let stream = self.stream_query(move |q| q.get_channel_entries_that_replace(&csv), entry_with_resolved_replaces);
        Ok(Response::new(stream))
    }

    async fn get_bundle_that_replaces(&self, request: Request<GetReplacementRequest>) -> Result<Response<ProtoBundle>, Status> {
        let GetReplacementRequest { csv_name, pkg_name, channel_name } = request.into_inner();
        let (csv, package, channel) = (CsvName::new(csv_name), PackageName::new(pkg_name), ChannelName::new(channel_name.clone()));
        let bundle = self.unary_query(move |q| q.get_bundle_that_replaces(&csv, &package, &channel)).await?;
        Ok(Response::new(convert::bundle_to_proto(bundle, &channel_name)))
    }

    async fn get_channel_entries_that_provide(
        &self,
        request: Request<GetAllProvidersRequest>,
    ) -> Result<Response<Self::GetChannelEntriesThatProvideStream>, Status> {
        let GetAllProvidersRequest { group, version, kind } = request.into_inner();
        let api = Api::new(group, version, kind, "");
        let stream = self.stream_query(move |q| q.get_channel_entries_that_provide(&api), entry_with_resolved_replaces);
        Ok(Response::new(stream))
    }

    async fn get_latest_channel_entries_that_provide(
        &self,
        request: Request<GetLatestProvidersRequest>,
    ) -> Result<Response<Self::GetLatestChannelEntriesThatProvideStream>, Status> {
        let GetLatestProvidersRequest { group, version, kind } = request.into_inner();
        let api = Api::new(group, version, kind, "");
        let stream = self.stream_query(move |q| q.get_latest_channel_entries_that_provide(&api), entry_with_resolved_replaces);
        Ok(Response::new(stream))
    }

    async fn get_default_bundle_that_provides(&self, request: Request<GetDefaultProviderRequest>) -> Result<Response<ProtoBundle>, Status> {
        let GetDefaultProviderRequest { group, version, kind } = request.into_inner();
        let api = Api::new(group, version, kind, "");
        let bundle = self.unary_query(move |q| q.get_bundle_that_provides(&api)).await?;
        Ok(Response::new(convert::bundle_to_proto(bundle, "")))
    }

    async fn list_bundles(&self, _request: Request<ListBundlesRequest>) -> Result<Response<Self::ListBundlesStream>, Status> {
        let stream = self.stream_query(|q| q.list_bundles(), |_, bundle| convert::bundle_to_proto(bundle, ""));
        Ok(Response::new(stream))
    }
}

/// The gRPC fully-qualified service name `grpc.health.v1.Health/Check`
/// reports on, so the CLI's server wiring can mark it `SERVING` without
/// repeating `operatorcatalog.v1.Catalog` as a string literal.
pub type CatalogServer = proto::catalog_server::CatalogServer<CatalogService>;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use opreg_loader::Loader;
    use opreg_model::{
        ChannelManifest, Dependency as Dep, PackageManifest, RelatedImage, UpdateMode, Version,
    };

    fn bundle(csv: &str, package: &str, version: &str, replaces: Option<&str>, skips: &[&str]) -> opreg_model::Bundle {
        let mut b = opreg_model::Bundle {
            csv_name: CsvName::new(csv),
            package_name: PackageName::new(package),
            version: Version::parse(version).unwrap(),
            bundle_path: format!("quay.io/{package}/{csv}"),
            skip_range: None,
            replaces: replaces.map(CsvName::new),
            skips: skips.iter().map(|s| CsvName::new(*s)).collect(),
            csv: serde_json::json!({ "kind": "ClusterServiceVersion", "metadata": { "name": csv } }),
            objects: Vec::new(),
            related_images: vec![RelatedImage::new("operator", format!("quay.io/{package}/{csv}-image")).unwrap()],
            provided_apis: vec![Api::new(format!("{package}.coreos.com"), "v1beta2", "EtcdCluster", "etcdclusters")],
            required_apis: Vec::new(),
            properties: Vec::new(),
            dependencies: vec![Dep::package("base", ">=1.0.0")],
        };
        b.ensure_package_property();
        b
    }

    fn service() -> CatalogService {
        let store = Store::create(":memory:").unwrap();
        let base = bundle("etcd.v0.9.0", "etcd", "0.9.0", None, &[]);
        let head = bundle("etcd.v0.9.2", "etcd", "0.9.2", Some("etcd.v0.9.0"), &["etcd.v0.9.1"]);
        let manifest = PackageManifest {
            package_name: PackageName::new("etcd"),
            default_channel: ChannelName::new("alpha"),
            channels: vec![ChannelManifest { name: ChannelName::new("alpha"), current_csv_name: CsvName::new("etcd.v0.9.2") }],
        };
        let loader = Loader::new(&store, UpdateMode::Replaces);
        loader.add_operator_bundle(&base).unwrap();
        loader.add_operator_bundle(&head).unwrap();
        loader.add_package_channels(&manifest, &[base, head]).unwrap();
        CatalogService::new(Arc::new(store), CancellationToken::new())
    }

    #[tokio::test]
    async fn get_package_round_trips_through_the_wire_schema() {
        let svc = service();
        let response = svc.get_package(Request::new(GetPackageRequest { name: "etcd".to_string() })).await.unwrap();
        let package = response.into_inner();
        assert_eq!(package.name, "etcd");
        assert_eq!(package.default_channel_name, "alpha");
        assert_eq!(package.channels.len(), 1);
        assert_eq!(package.channels[0].csv_name, "etcd.v0.9.2");
    }

    #[tokio::test]
    async fn get_package_maps_not_found_to_the_not_found_status_code() {
        let svc = service();
        let err = svc.get_package(Request::new(GetPackageRequest { name: "nope".to_string() })).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn get_bundle_carries_the_requested_channel_name_on_the_wire() {
        let svc = service();
        let response = svc
            .get_bundle(Request::new(GetBundleRequest {
                pkg_name: "etcd".to_string(),
                channel_name: "alpha".to_string(),
                csv_name: "etcd.v0.9.2".to_string(),
            }))
            .await
            .unwrap();
        let bundle = response.into_inner();
        assert_eq!(bundle.csv_name, "etcd.v0.9.2");
        assert_eq!(bundle.channel_name, "alpha");
        assert_eq!(bundle.replaces, "etcd.v0.9.0");
        assert_eq!(bundle.related_images.len(), 1);
    }

    #[tokio::test]
    async fn list_packages_streams_every_package_name() {
        let svc = service();
        let response = svc.list_packages(Request::new(ListPackagesRequest {})).await.unwrap();
        let names: Vec<_> = response.into_inner().collect::<Vec<_>>().await.into_iter().collect::<Result<_, _>>().unwrap();
        let names: Vec<ProtoPackageName> = names;
        assert_eq!(names.into_iter().map(|n| n.name).collect::<Vec<_>>(), vec!["etcd".to_string()]);
    }

    #[tokio::test]
    async fn get_channel_entries_that_replace_resolves_the_replaces_link_to_a_csv_name() {
        let svc = service();
        let response = svc
            .get_channel_entries_that_replace(Request::new(GetAllReplacementsRequest { csv_name: "etcd.v0.9.1".to_string() }))
            .await
            .unwrap();
        let entries: Vec<_> = response.into_inner().collect::<Vec<_>>().await.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bundle_name, "etcd.v0.9.2");
        assert_eq!(entries[0].replaces, "etcd.v0.9.1");
    }

    #[tokio::test]
    async fn list_bundles_streams_every_persisted_bundle() {
        let svc = service();
        let response = svc.list_bundles(Request::new(ListBundlesRequest {})).await.unwrap();
        let bundles: Vec<_> = response.into_inner().collect::<Vec<_>>().await.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
        let mut names: Vec<_> = bundles.into_iter().map(|b| b.csv_name).collect();
        names.sort();
        assert_eq!(names, vec!["etcd.v0.9.0".to_string(), "etcd.v0.9.2".to_string()]);
    }
}
