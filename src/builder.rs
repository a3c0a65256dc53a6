use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::directives::{DirectiveRegistry, DirectiveValidationResult, KconfigSearch, ParsedDirective};
use crate::domains::{Domain, KconfigDomain};
use crate::environment::{BuildContext, OutputFormat};
use crate::error::BuildError;
use crate::extension::{Extension, KconfigExtension};
use crate::inventory::{Inventory, INVENTORY_FILE};
use crate::nodes::{Doctree, Node};
use crate::parser::Parser;
use crate::renderer::render_body;
use crate::roles::{ReferenceResolver, ResolveCounts};
use crate::template::{PageContext, TemplateEngine};

#[derive(Debug, Clone)]
pub struct BuildStats {
    pub files_processed: usize,
    pub references_resolved: usize,
    pub references_external: usize,
    pub references_unresolved: usize,
    pub build_time: Duration,
    pub warnings: usize,
    pub warning_details: Vec<String>,
}

/// Documents read by one worker, with the domain data they registered
struct ReadChunk {
    docnames: Vec<String>,
    doctrees: Vec<Doctree>,
    domain: KconfigDomain,
}

pub struct SphinxBuilder {
    ctx: BuildContext,
    parser: Parser,
    directives: DirectiveRegistry,
    extensions: Vec<Box<dyn Extension>>,
    templates: TemplateEngine,
    parallel_jobs: usize,
    warnings: Mutex<Vec<String>>,
}

impl SphinxBuilder {
    pub fn new(config: BuildConfig, source_dir: PathBuf, output_dir: PathBuf) -> Result<Self> {
        let mut parallel_jobs = config.parallel_jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });

        let mut directives = DirectiveRegistry::new();
        let extensions: Vec<Box<dyn Extension>> = vec![Box::new(KconfigExtension::new())];
        for extension in &extensions {
            let metadata = extension.setup(&mut directives);
            debug!("Loaded extension '{}' {}", extension.name(), metadata.version);
            if !metadata.parallel_read_safe || !metadata.parallel_write_safe {
                warn!(
                    "Extension '{}' is not parallel safe, building serially",
                    extension.name()
                );
                parallel_jobs = 1;
            }
        }
        let mut registered = directives.get_registered_directives();
        registered.sort();
        debug!("Registered directives: {}", registered.join(", "));

        Ok(Self {
            ctx: BuildContext::new(config, source_dir, output_dir),
            parser: Parser::new(),
            directives,
            extensions,
            templates: TemplateEngine::new()?,
            parallel_jobs: parallel_jobs.max(1),
            warnings: Mutex::new(Vec::new()),
        })
    }

    pub fn set_parallel_jobs(&mut self, jobs: usize) {
        self.parallel_jobs = jobs.max(1);
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.ctx.format = format;
    }

    fn add_warning(&self, message: String) {
        warn!("{}", message);
        self.warnings.lock().push(message);
    }

    pub async fn clean(&self) -> Result<()> {
        if self.ctx.outdir.exists() {
            tokio::fs::remove_dir_all(&self.ctx.outdir).await?;
        }
        Ok(())
    }

    pub async fn build(&mut self) -> Result<BuildStats> {
        let start_time = Instant::now();
        info!("Starting {} build...", self.ctx.format);

        tokio::fs::create_dir_all(&self.ctx.outdir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", self.ctx.outdir.display()))?;
        self.ctx.outdir = self.ctx.outdir.canonicalize()?;
        self.ctx.srcdir = self
            .ctx
            .srcdir
            .canonicalize()
            .with_context(|| format!("Source directory not found: {}", self.ctx.srcdir.display()))?;

        for extension in &self.extensions {
            extension
                .builder_inited(&mut self.ctx)
                .with_context(|| format!("Extension '{}' failed to initialize", extension.name()))?;
        }

        let source_files = self.discover_source_files()?;
        info!("Discovered {} source files", source_files.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_jobs)
            .build()?;

        let mut doctrees = self.read_documents(&pool, &source_files)?;
        debug!("Domain holds {} objects after merge", self.ctx.domain.len());

        let counts = self.resolve_references(&pool, &mut doctrees);
        self.write_documents(&pool, &doctrees)?;

        if self.ctx.format == OutputFormat::Html {
            self.copy_static_assets().await?;
            self.copy_extra_paths().await?;
            self.write_inventory()?;
        }

        let build_time = start_time.elapsed();
        let warnings = self.warnings.lock().clone();
        let stats = BuildStats {
            files_processed: doctrees.len(),
            references_resolved: counts.resolved,
            references_external: counts.external,
            references_unresolved: counts.unresolved,
            build_time,
            warnings: warnings.len(),
            warning_details: warnings,
        };

        info!("Build completed in {:?}", build_time);
        Ok(stats)
    }

    fn discover_source_files(&self) -> Result<Vec<PathBuf>> {
        let outdir = &self.ctx.outdir;
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.ctx.srcdir).follow_links(true).into_iter();
        for entry in walker.filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                // skip the output directory, hidden directories and build artifacts
                return !(name.starts_with('.') || name == "_build" || entry.path().starts_with(outdir));
            }
            true
        }) {
            let entry = entry.with_context(|| format!("Failed to walk {}", self.ctx.srcdir.display()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "rst") {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    fn docname(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.ctx.srcdir).map_err(|_| {
            anyhow::anyhow!(
                "Path '{}' is not inside source directory '{}'",
                path.display(),
                self.ctx.srcdir.display()
            )
        })?;
        Ok(relative.with_extension("").to_string_lossy().replace('\\', "/"))
    }

    /// Reads the documents in chunks, one domain per worker, then merges the
    /// workers' domain data in document order.
    fn read_documents(&mut self, pool: &rayon::ThreadPool, files: &[PathBuf]) -> Result<Vec<Doctree>> {
        info!(
            "Reading {} files with {} parallel jobs",
            files.len(),
            self.parallel_jobs
        );

        let chunk_size = files.len().div_ceil(self.parallel_jobs).max(1);
        let this = &*self;
        let chunks: Vec<ReadChunk> = pool.install(|| {
            files
                .par_chunks(chunk_size)
                .map(|chunk| this.read_chunk(chunk))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut doctrees = Vec::with_capacity(files.len());
        for chunk in chunks {
            self.ctx.domain.merge_domaindata(&chunk.docnames, &chunk.domain);
            doctrees.extend(chunk.doctrees);
        }
        Ok(doctrees)
    }

    fn read_chunk(&self, files: &[PathBuf]) -> Result<ReadChunk> {
        let mut chunk = ReadChunk {
            docnames: Vec::with_capacity(files.len()),
            doctrees: Vec::with_capacity(files.len()),
            domain: KconfigDomain::new(),
        };

        for path in files {
            let doctree = self.read_document(path, &mut chunk.domain)?;
            chunk.docnames.push(doctree.docname.clone());
            chunk.doctrees.push(doctree);
        }
        Ok(chunk)
    }

    fn read_document(&self, path: &Path, domain: &mut KconfigDomain) -> Result<Doctree> {
        let docname = self.docname(path)?;
        debug!("Reading {}", docname);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source file: {}", path.display()))?;
        let mut doctree = self.parser.parse(&docname, &path.display().to_string(), &content);

        let nodes = std::mem::take(&mut doctree.children);
        for node in nodes {
            match node {
                Node::Directive(directive) => {
                    let produced = self
                        .run_directive(&directive, &docname, domain)
                        .with_context(|| format!("{}:{}", directive.location.file, directive.location.line))?;
                    doctree.children.extend(produced);
                }
                other => doctree.children.push(other),
            }
        }

        Ok(doctree)
    }

    fn run_directive(
        &self,
        directive: &ParsedDirective,
        docname: &str,
        domain: &mut KconfigDomain,
    ) -> Result<Vec<Node>, BuildError> {
        let location = format!("{}:{}", directive.location.file, directive.location.line);
        match self.directives.validate_directive(directive) {
            DirectiveValidationResult::Valid => {}
            DirectiveValidationResult::Warning(message) => {
                self.add_warning(format!("{}: {}", location, message));
            }
            DirectiveValidationResult::Error(message) => {
                self.add_warning(format!("{}: {}", location, message));
                return Ok(Vec::new());
            }
            DirectiveValidationResult::Unknown => {
                let mut message = format!("{}: Unknown directive type \"{}\"", location, directive.name);
                // the first suggestion only restates the name
                let hints: Vec<String> = self
                    .directives
                    .get_directive_suggestions(directive)
                    .into_iter()
                    .skip(1)
                    .collect();
                if !hints.is_empty() {
                    message.push_str(&format!(" ({})", hints.join(" ")));
                }
                self.add_warning(message);
                return Ok(Vec::new());
            }
        }

        match directive.name.as_str() {
            KconfigSearch::NAME => KconfigSearch::run(&self.ctx, domain, docname),
            _ => Ok(Vec::new()),
        }
    }

    fn load_inventories(&self) -> Vec<Inventory> {
        let mut inventories = Vec::new();
        for (name, target) in &self.ctx.config.intersphinx_mapping {
            let path = self.ctx.config.resolve_path(&self.ctx.srcdir, &target.inventory);
            match Inventory::load(&path, &target.uri) {
                Ok(inventory) => {
                    debug!("Loaded {} objects from intersphinx inventory '{}'", inventory.len(), name);
                    inventories.push(inventory);
                }
                Err(e) => self.add_warning(format!(
                    "failed to load intersphinx inventory '{}' from {}: {}",
                    name,
                    path.display(),
                    e
                )),
            }
        }
        inventories
    }

    fn resolve_references(&self, pool: &rayon::ThreadPool, doctrees: &mut [Doctree]) -> ResolveCounts {
        info!("Resolving references");
        let inventories = self.load_inventories();
        let suffix = format!(".{}", self.ctx.format.extension());
        let resolver = ReferenceResolver::new(&self.ctx.domain, &inventories, &suffix);

        pool.install(|| {
            doctrees
                .par_iter_mut()
                .map(|doctree| resolver.resolve(doctree))
                .reduce(ResolveCounts::default, |a, b| ResolveCounts {
                    resolved: a.resolved + b.resolved,
                    external: a.external + b.external,
                    unresolved: a.unresolved + b.unresolved,
                })
        })
    }

    fn write_documents(&self, pool: &rayon::ThreadPool, doctrees: &[Doctree]) -> Result<()> {
        info!("Writing {} pages", doctrees.len());
        pool.install(|| doctrees.par_iter().try_for_each(|doctree| self.write_document(doctree)))
    }

    fn write_document(&self, doctree: &Doctree) -> Result<()> {
        let project = &self.ctx.config.project;
        let title = match doctree.title() {
            Some(title) => format!("{} - {}", title, project),
            None => project.clone(),
        };
        let body = render_body(doctree, self.ctx.format);
        let mut page = PageContext::new(&doctree.docname, title, body);

        if self.ctx.format == OutputFormat::Html {
            for extension in &self.extensions {
                extension.html_page_context(&self.ctx, &mut page, Some(doctree));
            }
        }

        let rendered = self.templates.render_page(self.ctx.format, &page)?;
        let output_path = self
            .ctx
            .outdir
            .join(format!("{}.{}", doctree.docname, self.ctx.format.extension()));
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
        std::fs::write(&output_path, rendered)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        debug!("Wrote {}", output_path.display());
        Ok(())
    }

    async fn copy_static_assets(&self) -> Result<()> {
        if self.ctx.config.html_static_path.is_empty() {
            return Ok(());
        }

        info!("Copying static assets");
        let static_output_dir = self.ctx.outdir.join("_static");
        tokio::fs::create_dir_all(&static_output_dir)
            .await
            .with_context(|| format!("Failed to create static output directory: {}", static_output_dir.display()))?;

        for static_path in &self.ctx.config.html_static_path {
            let src_path = self.ctx.config.resolve_path(&self.ctx.srcdir, static_path);
            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &static_output_dir).await?;
            } else if src_path.is_file() {
                copy_file_into(&src_path, &static_output_dir).await?;
            } else {
                self.add_warning(format!("html_static_path entry '{}' does not exist", src_path.display()));
            }
        }

        Ok(())
    }

    /// Copy html_extra_path entries to the output root
    async fn copy_extra_paths(&self) -> Result<()> {
        if self.ctx.config.html_extra_path.is_empty() {
            return Ok(());
        }

        info!("Copying extra paths to output directory");
        for extra_path in &self.ctx.config.html_extra_path {
            let src_path = self.ctx.config.resolve_path(&self.ctx.srcdir, extra_path);

            if src_path.is_dir() {
                // don't copy the output directory into itself
                if let Ok(canonical) = src_path.canonicalize() {
                    if canonical.starts_with(&self.ctx.outdir) || self.ctx.outdir.starts_with(&canonical) {
                        warn!(
                            "html_extra_path '{}' overlaps the output directory, skipping",
                            src_path.display()
                        );
                        continue;
                    }
                }
                info!("Copying extra directory: {}", src_path.display());
                copy_dir_recursive(&src_path, &self.ctx.outdir).await.with_context(|| {
                    format!(
                        "Failed to copy html_extra_path directory '{}' to '{}'",
                        src_path.display(),
                        self.ctx.outdir.display()
                    )
                })?;
            } else if src_path.is_file() {
                copy_file_into(&src_path, &self.ctx.outdir).await?;
            } else {
                self.add_warning(format!("html_extra_path entry '{}' does not exist", src_path.display()));
            }
        }

        Ok(())
    }

    fn write_inventory(&self) -> Result<()> {
        let config = &self.ctx.config;
        let inventory = Inventory::from_objects(
            &config.project,
            config.version.as_deref().unwrap_or(""),
            self.ctx.domain.name(),
            ".html",
            self.ctx.domain.get_objects(),
        );
        let path = self.ctx.outdir.join(INVENTORY_FILE);
        inventory
            .write(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} objects to {}", inventory.len(), path.display());
        Ok(())
    }
}

async fn copy_file_into(src: &Path, dest_dir: &Path) -> Result<()> {
    let file_name = src
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid file path: {}", src.display()))?;
    let dest = dest_dir.join(file_name);
    debug!("Copying {} -> {}", src.display(), dest.display());
    tokio::fs::copy(src, &dest)
        .await
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}

/// Copies the contents of `src` into `dest`, keeping the tree layout.
async fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(&target).await?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(entry.path(), &target)
                .await
                .with_context(|| format!("Failed to copy {} to {}", entry.path().display(), target.display()))?;
        }
    }
    Ok(())
}
